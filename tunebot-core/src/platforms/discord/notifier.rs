use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use twilight_http::Client as HttpClient;
use twilight_http::request::channel::reaction::RequestReactionType;
use twilight_model::channel::message::Embed;
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder};

use tunebot_common::models::{CommandOrigin, MessageRef, PresentationHandle, ResultSet};
use tunebot_common::traits::Notifier;

use crate::Error;

const RESULTS_COLOR: u32 = 0xff0000;
const DESCRIPTION_PREVIEW_CHARS: usize = 100;

/// Builds the "pick one" embed: one numbered field per candidate.
pub fn results_embed(results: &ResultSet) -> Embed {
    results
        .iter()
        .fold(
            EmbedBuilder::new()
                .title("Search results")
                .color(RESULTS_COLOR)
                .description("Pick a video!"),
            |embed, (token, candidate)| {
                embed.field(EmbedFieldBuilder::new(
                    format!("{}. {}", token.number(), candidate.title),
                    candidate.summary(DESCRIPTION_PREVIEW_CHARS),
                ))
            },
        )
        .build()
}

/// [`Notifier`] backed by the Discord REST API.
pub struct DiscordNotifier {
    http: Arc<HttpClient>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }

    async fn delete_reactions(&self, message: &MessageRef) -> Result<(), Error> {
        self.http
            .delete_all_reactions(message.channel_id, message.message_id)
            .await
            .map_err(|e| Error::Platform(format!("Error clearing reactions: {e:?}")))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn present_choices(
        &self,
        origin: &CommandOrigin,
        results: &ResultSet,
    ) -> Result<PresentationHandle, Error> {
        let embeds = [results_embed(results)];
        let sent = self
            .http
            .create_message(origin.message.channel_id)
            .embeds(&embeds)
            .await
            .map_err(|e| Error::Platform(format!("Error sending results embed: {e:?}")))?
            .model()
            .await
            .map_err(|e| Error::Platform(format!("Error reading sent message: {e:?}")))?;

        let message = MessageRef {
            channel_id: sent.channel_id,
            message_id: sent.id,
        };
        let tokens = results.tokens();
        for token in &tokens {
            let reaction = RequestReactionType::Unicode { name: token.emoji() };
            if let Err(e) = self
                .http
                .create_reaction(message.channel_id, message.message_id, &reaction)
                .await
            {
                // Leave no half-built choice row behind.
                if let Err(clear_err) = self.delete_reactions(&message).await {
                    warn!("Could not roll back reactions on {}: {clear_err}", message.message_id);
                }
                return Err(Error::Platform(format!("Error adding reaction {token}: {e:?}")));
            }
        }
        debug!("Presented {} choices on message {}", tokens.len(), message.message_id);

        Ok(PresentationHandle { message, tokens })
    }

    async fn notify(&self, target: &MessageRef, text: &str) -> Result<(), Error> {
        self.http
            .create_message(target.channel_id)
            .content(text)
            .reply(target.message_id)
            .await
            .map_err(|e| Error::Platform(format!("Error sending Discord message: {e:?}")))?;
        Ok(())
    }

    async fn clear_choices(&self, presentation: &PresentationHandle) -> Result<(), Error> {
        self.delete_reactions(&presentation.message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tunebot_common::models::Candidate;

    #[test]
    fn embed_lists_numbered_candidates() {
        let long = "x".repeat(250);
        let results = ResultSet::build(vec![
            Candidate::new("a", "First", "short"),
            Candidate::new("b", "Second", long.as_str()),
        ])
        .unwrap();

        let embed = results_embed(&results);
        assert_eq!(embed.title.as_deref(), Some("Search results"));
        assert_eq!(embed.color, Some(RESULTS_COLOR));
        assert_eq!(embed.fields.len(), 2);
        assert_eq!(embed.fields[0].name, "1. First");
        assert_eq!(embed.fields[0].value, "short...");
        assert_eq!(embed.fields[1].name, "2. Second");
        assert_eq!(embed.fields[1].value.chars().count(), DESCRIPTION_PREVIEW_CHARS + 3);
    }
}
