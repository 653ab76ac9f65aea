// src/generate/prompt.rs
use std::fmt::Write as _;

use crate::model::Item;

pub fn system_prompt(topic: &str) -> String {
    format!(
        "You are a news analyst who writes concise daily briefings about {topic}. \
         Summarize only what the provided posts say, attribute claims to their sources, \
         and answer in GitHub-flavored markdown."
    )
}

/// Items are listed in the order given.
pub fn user_prompt(items: &[Item], topic: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Here are the {} most relevant posts about {topic} from the last 24 hours:\n",
        items.len()
    );
    for (i, it) in items.iter().enumerate() {
        let _ = writeln!(out, "{}. **\"{}\"**", i + 1, it.title);
        let _ = writeln!(out, "   Source: {}", it.source);
        let _ = writeln!(out, "   Score: {}", it.score);
        let _ = writeln!(out, "   URL: {}\n", it.url);
    }
    out.push_str(
        "Write a digest with exactly these sections:\n\
         ## Overview\n\
         Two or three sentences on the overall picture.\n\
         ## Key Developments\n\
         Bullet points for the most important stories, each with a markdown link.\n\
         ## Notable Highlights\n\
         Smaller items worth a look.\n\
         ## Sources\n\
         A bullet list of the links used.\n",
    );
    out
}

/// Short stable fingerprint, so request logs never carry prompt text.
pub fn fingerprint(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}
