//! Server command handlers: one reply, or a pending validation, per command.

use std::fmt;
use std::sync::Arc;
use std::task::{Poll, Waker};

use super::state::{ClientType, DataType, ServerState};
use crate::command::{Command, Verb, extract_path, split_param};
use crate::id::IdGenerator;
use crate::parser::Incoming;
use crate::pending::{Outcome, PendingResult, Validation};
use crate::types::{Address, EnhancedCode, Reply, ReplyCode};
use crate::validate::EnvelopeValidator;

type Completion = Box<dyn FnOnce(Outcome, &mut ServerState) -> Reply + Send>;

/// What a handler produced for a command.
pub enum Action {
    /// Reply now.
    Reply(Reply),
    /// Reply once the validation completes.
    Pending(PendingAction),
}

impl Action {
    /// Applies `complete` to a ready validation, or defers it.
    fn from_validation<F>(validation: Validation, state: &mut ServerState, complete: F) -> Self
    where
        F: FnOnce(Outcome, &mut ServerState) -> Reply + Send + 'static,
    {
        match validation {
            Validation::Ready(outcome) => Self::Reply(complete(outcome, state)),
            Validation::Pending(result) => Self::Pending(PendingAction {
                result,
                complete: Box::new(complete),
            }),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reply(reply) => f.debug_tuple("Reply").field(reply).finish(),
            Self::Pending(pending) => f.debug_tuple("Pending").field(pending).finish(),
        }
    }
}

/// A command waiting for its validation.
///
/// The completion runs on the connection's owning thread and both updates
/// the session state and builds the reply.
pub struct PendingAction {
    result: PendingResult,
    complete: Completion,
}

impl PendingAction {
    /// Polls the validation.
    pub fn poll(&mut self, waker: &Waker) -> Poll<Outcome> {
        self.result.poll(waker)
    }

    /// Applies the outcome to `state` and returns the reply.
    pub fn complete(self, outcome: Outcome, state: &mut ServerState) -> Reply {
        (self.complete)(outcome, state)
    }
}

impl fmt::Debug for PendingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingAction")
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

const INVALID_COMMAND: EnhancedCode = EnhancedCode::new(5, 5, 1);
const SYNTAX: EnhancedCode = EnhancedCode::new(5, 5, 2);
const BAD_PARAM: EnhancedCode = EnhancedCode::new(5, 5, 4);
const OK: EnhancedCode = EnhancedCode::new(2, 0, 0);

/// The server's command handlers.
#[derive(Clone)]
pub struct CommandHandlers {
    validator: Arc<dyn EnvelopeValidator>,
    ids: Arc<dyn IdGenerator>,
}

impl CommandHandlers {
    /// Creates handlers consulting `validator` and naming messages with `ids`.
    #[must_use]
    pub fn new(validator: Arc<dyn EnvelopeValidator>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { validator, ids }
    }

    /// Handles one unit of client input.
    pub fn handle_incoming(&self, incoming: Incoming, state: &mut ServerState) -> Action {
        match incoming {
            Incoming::Command(command) => self.handle(&command, state),
            Incoming::Malformed(line) => {
                tracing::debug!(line = %line, "malformed command");
                Action::Reply(state.reply(ReplyCode::SYNTAX_ERROR, SYNTAX, "syntax error"))
            }
            Incoming::TooLong => {
                Action::Reply(state.reply(ReplyCode::SYNTAX_ERROR, SYNTAX, "line too long"))
            }
        }
    }

    /// Handles a parsed command.
    pub fn handle(&self, command: &Command, state: &mut ServerState) -> Action {
        match &command.verb {
            Verb::Helo => Action::Reply(hello(&command.argument, ClientType::Basic, state)),
            Verb::Ehlo => Action::Reply(hello(&command.argument, ClientType::Extended, state)),
            Verb::Mail => self.mail(command, state),
            Verb::Rcpt => self.rcpt(command, state),
            Verb::Data => Action::Reply(data(command, state)),
            Verb::Rset => {
                state.reset();
                Action::Reply(state.reply(ReplyCode::OK, OK, "OK"))
            }
            Verb::Noop => Action::Reply(state.reply(ReplyCode::OK, OK, "OK")),
            Verb::Quit => {
                state.terminate();
                let text = format!("{} closing connection", state.server_id());
                Action::Reply(state.reply(ReplyCode::CLOSING, OK, text))
            }
            Verb::Vrfy => self.vrfy(command, state),
            Verb::Other(verb) => {
                tracing::debug!(verb = %verb, "unrecognized command");
                Action::Reply(state.reply(
                    ReplyCode::SYNTAX_ERROR,
                    INVALID_COMMAND,
                    "command not recognized",
                ))
            }
        }
    }

    fn mail(&self, command: &Command, state: &mut ServerState) -> Action {
        if state.client_type().is_none() {
            return Action::Reply(state.reply(
                ReplyCode::BAD_SEQUENCE,
                INVALID_COMMAND,
                "send HELO/EHLO first",
            ));
        }
        if state.sender().is_some() {
            return Action::Reply(state.reply(
                ReplyCode::BAD_SEQUENCE,
                INVALID_COMMAND,
                "sender already specified",
            ));
        }
        let Some(sender) = extract_path(&command.argument, "FROM:").and_then(parse_path) else {
            return Action::Reply(state.reply(
                ReplyCode::PARAMETER_ERROR,
                SYNTAX,
                "invalid sender syntax",
            ));
        };

        let mut data_type = None;
        for param in &command.params {
            match split_param(param) {
                (key, Some(value)) if key == "BODY" => {
                    data_type = match value.to_ascii_uppercase().as_str() {
                        "7BIT" => Some(DataType::SevenBit),
                        "8BITMIME" => Some(DataType::EightBitMime),
                        _ => {
                            return Action::Reply(state.reply(
                                ReplyCode::PARAMETER_ERROR,
                                BAD_PARAM,
                                format!("invalid BODY value: {value}"),
                            ));
                        }
                    };
                }
                (key, Some(value)) if key == "SIZE" => {
                    let Ok(size) = value.parse::<usize>() else {
                        return Action::Reply(state.reply(
                            ReplyCode::PARAMETER_ERROR,
                            BAD_PARAM,
                            format!("invalid SIZE value: {value}"),
                        ));
                    };
                    if state.max_message_size().is_some_and(|max| size > max) {
                        return Action::Reply(state.reply(
                            ReplyCode::EXCEEDED_STORAGE,
                            EnhancedCode::new(5, 3, 4),
                            "message size exceeds fixed maximum message size",
                        ));
                    }
                }
                (key, _) => {
                    return Action::Reply(state.reply(
                        ReplyCode::PARAMETERS_NOT_RECOGNIZED,
                        BAD_PARAM,
                        format!("unsupported parameter {key}"),
                    ));
                }
            }
        }

        let validation = self.validator.validate_sender(state.client_addr(), &sender);
        let ids = Arc::clone(&self.ids);
        Action::from_validation(validation, state, move |outcome, state| match outcome {
            Ok(()) => {
                let id = ids.generate();
                let reply = state.reply(
                    ReplyCode::OK,
                    EnhancedCode::new(2, 1, 0),
                    format!("sender <{sender}> ok, message id {id}"),
                );
                tracing::debug!(message_id = %id, "transaction started");
                state.begin_transaction(sender, data_type, id);
                reply
            }
            Err(error) => error.to_reply(state.is_enhanced_code_capable()),
        })
    }

    fn rcpt(&self, command: &Command, state: &mut ServerState) -> Action {
        if state.sender().is_none() {
            return Action::Reply(state.reply(
                ReplyCode::BAD_SEQUENCE,
                INVALID_COMMAND,
                "need MAIL command first",
            ));
        }
        let recipient = extract_path(&command.argument, "TO:")
            .filter(|path| !path.is_empty())
            .and_then(parse_path);
        let Some(recipient) = recipient else {
            return Action::Reply(state.reply(
                ReplyCode::PARAMETER_ERROR,
                SYNTAX,
                "invalid recipient syntax",
            ));
        };
        if let Some(param) = command.params.first() {
            let (key, _) = split_param(param);
            return Action::Reply(state.reply(
                ReplyCode::PARAMETERS_NOT_RECOGNIZED,
                BAD_PARAM,
                format!("unsupported parameter {key}"),
            ));
        }

        let validation = self
            .validator
            .validate_recipient(state.client_addr(), &recipient);
        Action::from_validation(validation, state, move |outcome, state| match outcome {
            Ok(()) => {
                let reply = state.reply(
                    ReplyCode::OK,
                    EnhancedCode::new(2, 1, 5),
                    format!("recipient <{recipient}> ok"),
                );
                state.add_recipient(recipient);
                reply
            }
            Err(error) => error.to_reply(state.is_enhanced_code_capable()),
        })
    }

    fn vrfy(&self, command: &Command, state: &mut ServerState) -> Action {
        let mut argument = command.argument.clone();
        for param in &command.params {
            argument.push(' ');
            argument.push_str(param);
        }
        let text = argument
            .find('<')
            .and_then(|start| {
                let rest = &argument[start + 1..];
                rest.find('>').map(|end| &rest[..end])
            })
            .unwrap_or(&argument);

        let target = text.trim().to_string();
        if target.is_empty() {
            return Action::Reply(state.reply(
                ReplyCode::PARAMETER_ERROR,
                SYNTAX,
                "user or mailbox required",
            ));
        }
        let validation = self.validator.verify(state.client_addr(), &target);
        Action::from_validation(validation, state, move |outcome, state| match outcome {
            Ok(()) => state.reply(
                ReplyCode::OK,
                EnhancedCode::new(2, 1, 5),
                format!("recipient <{target}> ok"),
            ),
            Err(error) => error.to_reply(state.is_enhanced_code_capable()),
        })
    }
}

impl fmt::Debug for CommandHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandHandlers").finish_non_exhaustive()
    }
}

fn parse_path(path: &str) -> Option<Address> {
    if path.is_empty() {
        Some(Address::null())
    } else {
        Address::new(path).ok()
    }
}

fn hello(domain: &str, client_type: ClientType, state: &mut ServerState) -> Reply {
    if domain.is_empty() {
        return state.reply(ReplyCode::PARAMETER_ERROR, SYNTAX, "domain name required");
    }
    state.reset();
    state.set_client(domain, client_type);

    let greeting = format!("{} Hello {domain}", state.server_id());
    match client_type {
        ClientType::Basic => Reply::new(ReplyCode::OK, None, greeting),
        ClientType::Extended => {
            let mut lines = vec![greeting];
            lines.extend(state.extensions().iter().map(ToString::to_string));
            Reply::multiline(ReplyCode::OK, None, lines)
        }
    }
}

fn data(command: &Command, state: &ServerState) -> Reply {
    if state.sender().is_none() {
        return state.reply(ReplyCode::BAD_SEQUENCE, INVALID_COMMAND, "need MAIL command first");
    }
    if state.recipients().is_empty() {
        return state.reply(ReplyCode::BAD_SEQUENCE, INVALID_COMMAND, "no valid recipients");
    }
    if !command.argument.is_empty() || !command.params.is_empty() {
        return state.reply(ReplyCode::PARAMETER_ERROR, BAD_PARAM, "no parameters allowed");
    }
    Reply::new(
        ReplyCode::START_DATA,
        None,
        "start mail input; end with <CRLF>.<CRLF>",
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use crate::pending::ValidationSender;
    use crate::types::Extension;
    use crate::validate::{AcceptAll, SmtpError};
    use std::net::SocketAddr;
    use std::sync::Mutex;

    struct FixedId;

    impl IdGenerator for FixedId {
        fn generate(&self) -> String {
            "msg-1".into()
        }
    }

    /// Rejects `nobody@*` and defers `later@*`.
    #[derive(Default)]
    struct Picky {
        deferred: Mutex<Option<ValidationSender>>,
    }

    impl EnvelopeValidator for Picky {
        fn validate_recipient(&self, _client: Option<SocketAddr>, recipient: &Address) -> Validation {
            if recipient.as_str().starts_with("nobody@") {
                Validation::reject(SmtpError::unknown_mailbox(recipient))
            } else if recipient.as_str().starts_with("later@") {
                let (sender, validation) = Validation::pending();
                *self.deferred.lock().unwrap() = Some(sender);
                validation
            } else {
                Validation::accept()
            }
        }
    }

    fn handlers(validator: Arc<dyn EnvelopeValidator>) -> CommandHandlers {
        CommandHandlers::new(validator, Arc::new(FixedId))
    }

    fn state() -> ServerState {
        ServerState::new(
            "mx.example.com",
            vec![
                Extension::EnhancedStatusCodes,
                Extension::Pipelining,
                Extension::Size(Some(1000)),
            ],
        )
    }

    fn reply(handlers: &CommandHandlers, line: &str, state: &mut ServerState) -> Reply {
        match handlers.handle(&Command::parse(line).unwrap(), state) {
            Action::Reply(reply) => reply,
            Action::Pending(_) => panic!("unexpected pending action for {line}"),
        }
    }

    fn code(reply: &Reply) -> (u16, Option<String>) {
        (reply.code.as_u16(), reply.enhanced.map(|e| e.to_string()))
    }

    #[test]
    fn ehlo_lists_extensions() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        let reply = reply(&handlers, "EHLO client.example.org", &mut state);
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(
            reply.message,
            vec![
                "mx.example.com Hello client.example.org",
                "ENHANCEDSTATUSCODES",
                "PIPELINING",
                "SIZE 1000"
            ]
        );
        assert_eq!(state.client_type(), Some(ClientType::Extended));
        assert!(state.is_enhanced_code_capable());
    }

    #[test]
    fn helo_without_domain() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        let reply = reply(&handlers, "HELO", &mut state);
        assert_eq!(code(&reply), (501, None));
        assert!(state.client_type().is_none());
    }

    #[test]
    fn mail_requires_hello() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        assert_eq!(code(&reply(&handlers, "MAIL FROM:<a@b.c>", &mut state)).0, 503);
    }

    #[test]
    fn full_envelope() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);

        let mail = reply(&handlers, "MAIL FROM:<a@b.c> BODY=8BITMIME SIZE=500", &mut state);
        assert_eq!(code(&mail), (250, Some("2.1.0".into())));
        assert!(mail.message_text().contains("msg-1"));
        assert_eq!(state.message_id(), Some("msg-1"));
        assert_eq!(state.data_type(), Some(DataType::EightBitMime));

        let rcpt = reply(&handlers, "RCPT TO:<d@e.f>", &mut state);
        assert_eq!(code(&rcpt), (250, Some("2.1.5".into())));
        assert_eq!(state.recipients(), &[Address::new("d@e.f").unwrap()]);

        let data = reply(&handlers, "DATA", &mut state);
        assert_eq!(code(&data), (354, None));
    }

    #[test]
    fn null_sender_accepted() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "HELO client", &mut state);
        let mail = reply(&handlers, "MAIL FROM:<>", &mut state);
        assert_eq!(code(&mail), (250, None));
        assert!(state.sender().unwrap().is_null());
    }

    #[test]
    fn mail_parameter_errors() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);

        let cases = [
            ("MAIL FROM:a@b.c", 501, "5.5.2"),
            ("MAIL FROM:<a@b.c> BODY=BINARYMIME", 501, "5.5.4"),
            ("MAIL FROM:<a@b.c> SIZE=2000", 552, "5.3.4"),
            ("MAIL FROM:<a@b.c> SIZE=lots", 501, "5.5.4"),
            ("MAIL FROM:<a@b.c> AUTH=<>", 555, "5.5.4"),
        ];
        for (line, expected, enhanced) in cases {
            let reply = reply(&handlers, line, &mut state);
            assert_eq!(code(&reply), (expected, Some(enhanced.into())), "{line}");
            assert!(state.sender().is_none());
        }
    }

    #[test]
    fn second_mail_is_out_of_sequence() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);
        reply(&handlers, "MAIL FROM:<a@b.c>", &mut state);
        let again = reply(&handlers, "MAIL FROM:<x@y.z>", &mut state);
        assert_eq!(code(&again), (503, Some("5.5.1".into())));
    }

    #[test]
    fn rcpt_and_data_sequencing() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);
        assert_eq!(code(&reply(&handlers, "RCPT TO:<d@e.f>", &mut state)).0, 503);
        assert_eq!(code(&reply(&handlers, "DATA", &mut state)).0, 503);

        reply(&handlers, "MAIL FROM:<a@b.c>", &mut state);
        assert_eq!(code(&reply(&handlers, "DATA", &mut state)).0, 503);
        assert_eq!(code(&reply(&handlers, "RCPT TO:<>", &mut state)).0, 501);
        reply(&handlers, "RCPT TO:<d@e.f>", &mut state);
        assert_eq!(
            code(&reply(&handlers, "DATA now", &mut state)),
            (501, Some("5.5.4".into()))
        );
    }

    #[test]
    fn rejected_recipient_not_recorded() {
        let handlers = handlers(Arc::new(Picky::default()));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);
        reply(&handlers, "MAIL FROM:<a@b.c>", &mut state);
        let rcpt = reply(&handlers, "RCPT TO:<nobody@e.f>", &mut state);
        assert_eq!(code(&rcpt), (550, Some("5.1.1".into())));
        assert!(state.recipients().is_empty());
    }

    #[test]
    fn rejection_without_ehlo_drops_enhanced_code() {
        let handlers = handlers(Arc::new(Picky::default()));
        let mut state = state();
        reply(&handlers, "HELO client", &mut state);
        reply(&handlers, "MAIL FROM:<a@b.c>", &mut state);
        let rcpt = reply(&handlers, "RCPT TO:<nobody@e.f>", &mut state);
        assert_eq!(code(&rcpt), (550, None));
    }

    #[test]
    fn pending_recipient_completes_later() {
        let picky = Arc::new(Picky::default());
        let handlers = handlers(picky.clone());
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);
        reply(&handlers, "MAIL FROM:<a@b.c>", &mut state);

        let Action::Pending(mut pending) =
            handlers.handle(&Command::parse("RCPT TO:<later@e.f>").unwrap(), &mut state)
        else {
            panic!("expected a pending action");
        };
        assert!(pending.poll(Waker::noop()).is_pending());
        assert!(state.recipients().is_empty());

        let sender = picky.deferred.lock().unwrap().take().unwrap();
        assert!(sender.complete(Ok(())));
        let Poll::Ready(outcome) = pending.poll(Waker::noop()) else {
            panic!("expected the outcome");
        };
        let reply = pending.complete(outcome, &mut state);
        assert_eq!(code(&reply), (250, Some("2.1.5".into())));
        assert_eq!(state.recipients().len(), 1);
    }

    #[test]
    fn rset_keeps_identity() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);
        reply(&handlers, "MAIL FROM:<a@b.c>", &mut state);
        let rset = reply(&handlers, "RSET", &mut state);
        assert_eq!(code(&rset), (250, Some("2.0.0".into())));
        assert!(state.sender().is_none());
        assert_eq!(state.client_domain(), Some("client"));
    }

    #[test]
    fn quit_terminates() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        let quit = reply(&handlers, "QUIT", &mut state);
        assert_eq!(quit.code, ReplyCode::CLOSING);
        assert!(state.is_terminated());
    }

    #[test]
    fn vrfy_extracts_bracketed_address() {
        let handlers = handlers(Arc::new(Picky::default()));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);

        let ok = reply(&handlers, "VRFY John Doe <john@example.com>", &mut state);
        assert_eq!(code(&ok), (250, Some("2.1.5".into())));
        assert_eq!(ok.message_text(), "recipient <john@example.com> ok");

        let bare = reply(&handlers, "VRFY jane@example.com", &mut state);
        assert_eq!(bare.message_text(), "recipient <jane@example.com> ok");

        let unknown = reply(&handlers, "VRFY <nobody@example.com>", &mut state);
        assert_eq!(code(&unknown), (550, Some("5.1.1".into())));
    }

    /// Records every `VRFY` argument and knows only `postmaster`.
    #[derive(Default)]
    struct Directory(Mutex<Vec<String>>);

    impl EnvelopeValidator for Directory {
        fn verify(&self, _client: Option<SocketAddr>, argument: &str) -> Validation {
            self.0.lock().unwrap().push(argument.to_string());
            if argument.eq_ignore_ascii_case("postmaster") {
                Validation::accept()
            } else {
                Validation::reject(SmtpError::new(
                    ReplyCode::MAILBOX_UNAVAILABLE,
                    Some(EnhancedCode::new(5, 1, 1)),
                    "no such user",
                ))
            }
        }
    }

    #[test]
    fn vrfy_passes_plain_names_to_the_validator() {
        let directory = Arc::new(Directory::default());
        let handlers = handlers(directory.clone());
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);

        let known = reply(&handlers, "VRFY postmaster", &mut state);
        assert_eq!(code(&known), (250, Some("2.1.5".into())));
        assert_eq!(known.message_text(), "recipient <postmaster> ok");

        let unknown = reply(&handlers, "VRFY John Smith", &mut state);
        assert_eq!(code(&unknown), (550, Some("5.1.1".into())));

        let empty = reply(&handlers, "VRFY", &mut state);
        assert_eq!(code(&empty), (501, Some("5.5.2".into())));

        assert_eq!(*directory.0.lock().unwrap(), ["postmaster", "John Smith"]);
    }

    #[test]
    fn vrfy_plain_name_accepted_by_default() {
        let handlers = handlers(Arc::new(Picky::default()));
        let mut state = state();
        let ok = reply(&handlers, "VRFY jsmith", &mut state);
        assert_eq!(code(&ok), (250, None));
        assert_eq!(ok.message_text(), "recipient <jsmith> ok");
    }

    #[test]
    fn rcpt_accepts_domainless_postmaster() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);
        reply(&handlers, "MAIL FROM:<a@example.org>", &mut state);

        let ok = reply(&handlers, "RCPT TO:<Postmaster>", &mut state);
        assert_eq!(code(&ok), (250, Some("2.1.5".into())));
        assert!(state.recipients()[0].is_postmaster());

        let bad = reply(&handlers, "RCPT TO:<webmaster>", &mut state);
        assert_eq!(code(&bad), (501, Some("5.5.2".into())));
    }

    #[test]
    fn unknown_and_malformed_input() {
        let handlers = handlers(Arc::new(AcceptAll));
        let mut state = state();
        reply(&handlers, "EHLO client", &mut state);

        let unknown = reply(&handlers, "STARTTLS", &mut state);
        assert_eq!(code(&unknown), (500, Some("5.5.1".into())));

        let Action::Reply(malformed) =
            handlers.handle_incoming(Incoming::Malformed("???".into()), &mut state)
        else {
            panic!("expected a reply");
        };
        assert_eq!(code(&malformed), (500, Some("5.5.2".into())));
    }
}
