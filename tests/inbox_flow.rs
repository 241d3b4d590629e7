use std::sync::Arc;

use argon2::Params;
use inbox_cache::auth::PasswordService;
use inbox_cache::{
    InboxError, MailRecord, MemoryStore, MemoryUserStore, UserDirectory, UserStore,
};

fn passwords() -> PasswordService {
    let params = Params::new(1024, 1, 1, None).expect("valid params");
    PasswordService::with_params("integration-secret", params)
}

fn delivered(id: i64, subject: &str, body: &str) -> MailRecord {
    MailRecord::new(
        id,
        format!(
            "From: Sender <sender@example.com>\r\nDate: Mon, 7 Mar 2011 12:00:00 +0000\r\nSubject: {subject}\r\n\r\n{body}"
        ),
    )
}

fn setup() -> (
    UserDirectory<MemoryUserStore, MemoryStore>,
    Arc<MemoryStore>,
    Arc<MemoryUserStore>,
) {
    let cache = Arc::new(MemoryStore::new());
    cache.insert(
        "a@b.com",
        vec![
            delivered(1, "first", "one"),
            delivered(2, "second", "two <script>alert('x')</script>"),
            delivered(3, "third", "three"),
        ],
    );
    let users = Arc::new(MemoryUserStore::new());
    let directory = UserDirectory::new(users.clone(), cache.clone(), passwords());
    (directory, cache, users)
}

#[tokio::test]
async fn browse_read_and_delete() {
    let (directory, cache, _) = setup();

    let user = directory
        .lookup_or_create("a@b.com")
        .await
        .expect("user lookup");
    let mut mailbox = directory.inbox(&user, "").await.expect("inbox opens");

    let listing = mailbox.latest_listing(2);
    assert_eq!(listing.msg_count, 2);
    let listed: Vec<i64> = listing.messages.iter().map(|m| m.msg_id).collect();
    assert_eq!(listed, vec![3, 2]);

    let second = mailbox.message_transport(2).expect("message 2 exists");
    assert_eq!(second.subject.as_deref(), Some("second"));
    assert_eq!(
        second.sender.as_deref(),
        Some("Sender <sender@example.com>")
    );
    assert!(second.content.contains("&lt;script&gt;"));
    assert!(!second.content.contains("<script>"));

    assert!(mailbox.delete_message(2).await.expect("delete runs"));
    assert!(!mailbox.delete_message(2).await.expect("delete runs"));

    let stored: Vec<i64> = cache
        .snapshot("a@b.com")
        .expect("inbox still cached")
        .iter()
        .map(|r| r.message_id)
        .collect();
    assert_eq!(stored, vec![1, 3]);

    // A fresh snapshot sees the write-back.
    let reopened = directory.inbox(&user, "").await.expect("inbox reopens");
    assert!(matches!(
        reopened.message_by_id(2),
        Err(InboxError::NoSuchMessage(2))
    ));
}

#[tokio::test]
async fn listing_serializes_to_wire_shape() {
    let (directory, _, _) = setup();
    let user = directory.lookup_or_create("a@b.com").await.unwrap();
    let mailbox = directory.inbox(&user, "").await.unwrap();

    let json = serde_json::to_value(mailbox.latest_listing(1)).unwrap();
    assert_eq!(json["msg_count"], 1);
    let message = &json["messages"][0];
    assert_eq!(message["msg_id"], 3);
    assert_eq!(message["subject"], "third");
    assert_eq!(message["recieved_date"], "Mon, 7 Mar 2011 12:00:00 +0000");
    assert_eq!(message["read_state"], false);
    assert_eq!(message["content"], "three<br />");
}

#[tokio::test]
async fn password_gate_and_eviction() {
    let (directory, cache, users) = setup();

    let mut user = directory.lookup_or_create("a@b.com").await.unwrap();
    directory.set_password(&mut user, "open sesame").await.unwrap();

    // Re-read the persisted user, as a later request would.
    let user = users.get("a@b.com").await.unwrap().expect("user persisted");
    assert!(matches!(
        directory.inbox(&user, "guess").await,
        Err(InboxError::PasswordProtected(_))
    ));
    assert!(directory.inbox(&user, "open sesame").await.is_ok());

    cache.evict("a@b.com");
    assert!(matches!(
        directory.inbox(&user, "open sesame").await,
        Err(InboxError::NoSuchUser(_))
    ));
}
