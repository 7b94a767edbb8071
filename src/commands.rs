use std::sync::Arc;

use tracing::{debug, info};

use crate::error::RelayError;
use crate::formatter::{DeliveryArtifact, ResultFormatter};
use crate::platform::{ChatId, ChatPlatform};
use crate::prover::ProofClient;

pub const UNKNOWN_COMMAND: &str = "I don't know that command";

const COMMAND_MARKER: char = '/';

/// A message that starts with the command marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
    /// Bot named in `/name@bot`, if any
    pub addressee: Option<String>,
}

impl Command {
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.strip_prefix(COMMAND_MARKER)?;
        // "/ proof" is not a command
        if body.starts_with(char::is_whitespace) {
            return None;
        }

        let mut tokens = body.split_whitespace();
        let head = tokens.next()?;

        let (name, addressee) = match head.split_once('@') {
            Some((name, bot)) => (name, Some(bot.to_string())),
            None => (head, None),
        };
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            args: tokens.map(str::to_string).collect(),
            addressee,
        })
    }

    /// Whether this command is meant for the bot called `username`.
    pub fn is_addressed_to(&self, username: Option<&str>) -> bool {
        match (&self.addressee, username) {
            (Some(addressee), Some(username)) => addressee.eq_ignore_ascii_case(username),
            _ => true,
        }
    }
}

/// Commands this bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Proof,
}

impl CommandKind {
    pub const ALL: [CommandKind; 1] = [CommandKind::Proof];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Proof => "proof",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

pub struct CommandDispatcher {
    prover: ProofClient,
    formatter: ResultFormatter,
    platform: Arc<dyn ChatPlatform>,
}

impl CommandDispatcher {
    pub fn new(
        prover: ProofClient,
        formatter: ResultFormatter,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            prover,
            formatter,
            platform,
        }
    }

    pub async fn handle(
        &self,
        command: &Command,
        sender_id: Option<&str>,
        chat_id: ChatId,
    ) -> Result<DeliveryArtifact, RelayError> {
        let Some(kind) = CommandKind::from_name(&command.name) else {
            debug!("Unknown command: /{}", command.name);
            return Ok(DeliveryArtifact::Text(UNKNOWN_COMMAND.to_string()));
        };

        match kind {
            CommandKind::Proof => self.proof(command, sender_id, chat_id).await,
        }
    }

    /// Members may only prove their own membership, so both request fields
    /// come from the sender and never from command arguments.
    async fn proof(
        &self,
        command: &Command,
        sender_id: Option<&str>,
        chat_id: ChatId,
    ) -> Result<DeliveryArtifact, RelayError> {
        let member = sender_id.ok_or(RelayError::MissingSender)?;
        if !command.args.is_empty() {
            debug!("Ignoring arguments to /proof: {:?}", command.args);
        }

        self.platform.send_typing(chat_id).await.ok();

        let proof = self.prover.request_proof(member, member).await?;
        info!("Proof generated for member {}", member);

        match self.formatter.format(&proof)? {
            DeliveryArtifact::Text(text) if text.is_empty() => Err(RelayError::EmptyProof),
            artifact => Ok(artifact),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProverConfig;
    use crate::formatter::DeliveryMode;
    use crate::platform::recording::RecordingPlatform;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn dispatcher(
        base_url: &str,
        mode: DeliveryMode,
        platform: Arc<RecordingPlatform>,
    ) -> CommandDispatcher {
        let prover = ProofClient::new(&ProverConfig {
            base_url: base_url.to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        let formatter = ResultFormatter::new(mode, std::env::temp_dir());
        CommandDispatcher::new(prover, formatter, platform)
    }

    fn cmd(text: &str) -> Command {
        Command::parse(text).unwrap()
    }

    #[test]
    fn test_parse_name_and_args() {
        let c = cmd("/proof  alice   bob");
        assert_eq!(c.name, "proof");
        assert_eq!(c.args, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(c.addressee, None);
    }

    #[test]
    fn test_parse_addressee() {
        let c = cmd("/proof@MembersBot");
        assert_eq!(c.name, "proof");
        assert!(c.args.is_empty());
        assert_eq!(c.addressee.as_deref(), Some("MembersBot"));
        assert!(c.is_addressed_to(Some("membersbot")));
        assert!(!c.is_addressed_to(Some("OtherBot")));
        assert!(c.is_addressed_to(None));
        assert!(cmd("/proof").is_addressed_to(Some("OtherBot")));
    }

    #[test]
    fn test_parse_rejects_non_commands() {
        assert_eq!(Command::parse("proof"), None);
        assert_eq!(Command::parse("hello /proof"), None);
        assert_eq!(Command::parse("/"), None);
        assert_eq!(Command::parse("/ proof"), None);
        assert_eq!(Command::parse("/@bot"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_kind_lookup() {
        assert_eq!(CommandKind::from_name("proof"), Some(CommandKind::Proof));
        assert_eq!(CommandKind::from_name("Proof"), None);
        assert_eq!(CommandKind::from_name("prove"), None);
        assert_eq!(CommandKind::from_name("start"), None);
        assert_eq!(CommandKind::from_name("help"), None);
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_name(kind.name()), Some(kind));
        }
    }

    #[tokio::test]
    async fn test_unknown_command_is_fixed_text() {
        let platform = Arc::new(RecordingPlatform::default());
        let d = dispatcher("http://127.0.0.1:9", DeliveryMode::Text, platform.clone());

        for text in ["/weather", "/PROOF", "/proofs now", "/start", "/help"] {
            match d.handle(&cmd(text), Some("1"), ChatId(5)).await.unwrap() {
                DeliveryArtifact::Text(t) => assert_eq!(t, "I don't know that command"),
                other => panic!("expected text, got {:?}", other),
            }
        }
        assert!(platform.typing().is_empty());
    }

    #[tokio::test]
    async fn test_proof_uses_sender_and_ignores_args() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/generate-proof"))
            .and(body_json(json!({"member": "1001", "expected_member": "1001"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"proof": {"0": "a", "1": "b"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let platform = Arc::new(RecordingPlatform::default());
        let d = dispatcher(&server.uri(), DeliveryMode::Text, platform.clone());

        let artifact = d
            .handle(&cmd("/proof 666 someone-else"), Some("1001"), ChatId(5))
            .await
            .unwrap();
        match artifact {
            DeliveryArtifact::Text(t) => assert_eq!(t, "ab"),
            other => panic!("expected text, got {:?}", other),
        }
        assert_eq!(platform.typing(), vec![ChatId(5)]);
    }

    #[tokio::test]
    async fn test_proof_without_sender_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let platform = Arc::new(RecordingPlatform::default());
        let d = dispatcher(&server.uri(), DeliveryMode::Text, platform);

        let err = d.handle(&cmd("/proof"), None, ChatId(5)).await.unwrap_err();
        assert!(matches!(err, RelayError::MissingSender));
    }

    #[tokio::test]
    async fn test_empty_text_proof_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"proof": {"pi_a": "x"}})),
            )
            .mount(&server)
            .await;

        let platform = Arc::new(RecordingPlatform::default());
        let d = dispatcher(&server.uri(), DeliveryMode::Text, platform);

        let err = d.handle(&cmd("/proof"), Some("9"), ChatId(5)).await.unwrap_err();
        assert!(matches!(err, RelayError::EmptyProof));
    }

    #[tokio::test]
    async fn test_typing_failure_does_not_abort_proof() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"proof": {"0": "z"}})))
            .expect(1)
            .mount(&server)
            .await;

        let platform = Arc::new(RecordingPlatform::failing());
        let d = dispatcher(&server.uri(), DeliveryMode::Text, platform);

        let artifact = d.handle(&cmd("/proof"), Some("9"), ChatId(5)).await.unwrap();
        assert!(matches!(artifact, DeliveryArtifact::Text(t) if t == "z"));
    }
}
