use serde::{Deserialize, Serialize};

/// One search hit the user may choose to play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Provider media id (YouTube video id). Absent for hits that cannot be played.
    pub external_id: Option<String>,
    pub title: String,
    pub description: String,
}

impl Candidate {
    pub fn new(
        external_id: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            external_id: Some(external_id.into()),
            title: title.into(),
            description: description.into(),
        }
    }

    /// The id needed to open a stream, if the hit carries a usable one.
    pub fn media_id(&self) -> Option<&str> {
        self.external_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Description cut to `max_chars` characters with a trailing ellipsis.
    pub fn summary(&self, max_chars: usize) -> String {
        let cut: String = self.description.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_external_id_is_not_playable() {
        let mut c = Candidate::new("  ", "title", "desc");
        assert_eq!(c.media_id(), None);
        c.external_id = None;
        assert_eq!(c.media_id(), None);
        c.external_id = Some("dQw4w9WgXcQ".into());
        assert_eq!(c.media_id(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn summary_counts_chars_not_bytes() {
        let c = Candidate::new("id", "t", "한국어 설명입니다");
        assert_eq!(c.summary(3), "한국어...");
        assert_eq!(Candidate::new("id", "t", "").summary(100), "...");
    }
}
