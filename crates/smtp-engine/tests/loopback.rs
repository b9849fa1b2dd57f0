//! Client and server sessions talking to each other over an in-memory pipe.

mod common;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::Pipe;
use smtp_engine::{
    Address, ClientConfig, ClientEventDispatch, ClientSessionFactory, Connection, DeliveryHandler,
    DeliveryQueue, DeliveryRequest, DeliveryRequestHandler, EnvelopeValidator, IoHandle,
    ReceivedMessage, ServerConfig, ServerEventDispatch, ServerSessionFactory, SessionRegistry,
    SmtpError, Validation,
};

#[derive(Default)]
struct Inbox(Mutex<Vec<ReceivedMessage>>);

impl DeliveryHandler for Inbox {
    fn deliver(&self, message: ReceivedMessage) -> Validation {
        self.0.lock().unwrap().push(message);
        Validation::accept()
    }
}

struct BlockList;

impl EnvelopeValidator for BlockList {
    fn validate_recipient(&self, _client: Option<SocketAddr>, recipient: &Address) -> Validation {
        if recipient.domain() == Some("blocked.example") {
            Validation::reject(SmtpError::unknown_mailbox(recipient))
        } else {
            Validation::accept()
        }
    }
}

fn address(text: &str) -> Address {
    Address::new(text).unwrap()
}

struct Harness {
    server: ServerEventDispatch,
    client: ClientEventDispatch,
    inbox: Arc<Inbox>,
    queue: Arc<DeliveryQueue>,
    registry: Arc<SessionRegistry>,
}

impl Harness {
    fn new(requests: Vec<DeliveryRequest>) -> Self {
        let inbox = Arc::new(Inbox::default());
        let queue = Arc::new(DeliveryQueue::with_requests(requests));
        let registry = Arc::new(SessionRegistry::new());

        let delivery: Arc<dyn DeliveryHandler> = inbox.clone();
        let server = ServerEventDispatch::new(
            ServerSessionFactory::new(ServerConfig::new("mx.example.com"), delivery)
                .with_validator(Arc::new(BlockList)),
            Arc::clone(&registry),
        );
        let handler: Arc<dyn DeliveryRequestHandler> = queue.clone();
        let client = ClientEventDispatch::new(
            ClientSessionFactory::new(ClientConfig::new("relay.example.org"), handler),
            Arc::clone(&registry),
        );
        Self {
            server,
            client,
            inbox,
            queue,
            registry,
        }
    }

    fn run(&self, write_limit: usize) -> bool {
        let (mut server_end, mut client_end) = Pipe::pair();
        server_end.write_limit = write_limit;
        client_end.write_limit = write_limit;
        let mut server_conn = Connection::new(
            IoHandle::new(server_end).with_remote_addr(SocketAddr::from(([192, 0, 2, 1], 40000))),
        );
        let mut client_conn = Connection::new(IoHandle::new(client_end));
        common::run_pair(
            &self.server,
            &mut server_conn,
            &self.client,
            &mut client_conn,
            Duration::from_secs(5),
        )
    }
}

#[test]
fn two_transactions_in_one_session() {
    common::init_tracing();
    let harness = Harness::new(vec![
        DeliveryRequest::new(
            address("alice@example.org"),
            vec![address("bob@example.com"), address("mallory@blocked.example")],
            "Subject: first\r\n\r\n.leading dot\r\n",
        )
        .unwrap(),
        DeliveryRequest::new(
            address("alice@example.org"),
            vec![address("eve@blocked.example")],
            "Subject: second\r\n\r\nnever sent\r\n",
        )
        .unwrap(),
    ]);

    assert!(harness.run(usize::MAX));
    assert!(harness.registry.is_empty());

    let messages = harness.inbox.0.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].sender, address("alice@example.org"));
    assert_eq!(messages[0].recipients, [address("bob@example.com")]);
    assert_eq!(&messages[0].content[..], b"Subject: first\r\n\r\n.leading dot\r\n");
    assert_eq!(messages[0].client_domain.as_deref(), Some("relay.example.org"));

    let results = harness.queue.results();
    assert_eq!(results.len(), 2);
    let (_, first) = &results[0];
    assert!(first.is_success());
    assert_eq!(first.accepted(), [address("bob@example.com")]);
    assert_eq!(first.failures().len(), 1);
    assert_eq!(first.failures()[0].reply.code.as_u16(), 550);

    let (_, second) = &results[1];
    assert!(!second.is_success());
    assert!(second.accepted().is_empty());
    assert_eq!(second.failures()[0].recipient, address("eve@blocked.example"));
    assert!(harness.queue.errors().is_empty());
}

#[test]
fn short_writes_do_not_corrupt_the_dialogue() {
    let content = "Subject: chunked\r\n\r\n".to_owned() + &"line of text\r\n".repeat(200);
    let harness = Harness::new(vec![
        DeliveryRequest::new(
            address("alice@example.org"),
            vec![address("bob@example.com")],
            content.clone(),
        )
        .unwrap(),
    ]);

    assert!(harness.run(7));

    let messages = harness.inbox.0.lock().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].content, content.as_bytes());
    assert!(harness.queue.results()[0].1.is_success());
}

#[test]
fn empty_queue_just_says_goodbye() {
    let harness = Harness::new(Vec::new());
    assert!(harness.run(usize::MAX));
    assert!(harness.inbox.0.lock().unwrap().is_empty());
    assert!(harness.queue.results().is_empty());
    assert!(harness.registry.wait_until_empty(Duration::from_millis(10)));
}
