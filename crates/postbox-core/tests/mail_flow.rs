//! End-to-end mail lifecycle against an in-memory database.

#![allow(clippy::unwrap_used)]

use postbox_core::{
    AddressHistory, Composition, Database, Error, ErrorKind, Folder, FolderSummary,
    IdentityDirectory, MailService, MailboxEntry, MailboxIndex, MessageId, NewUser,
    SqliteMailboxIndex, SqliteMessageStore, User, UserId, UserRepository,
};
use sqlx::SqliteConnection;

/// Delegates to the `SQLite` index but refuses inbox delivery to one user.
struct FailingIndex {
    inner: SqliteMailboxIndex,
    refuse_inbox_for: UserId,
}

impl MailboxIndex for FailingIndex {
    async fn add_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
        folder: Folder,
    ) -> postbox_core::Result<()> {
        if folder == Folder::Inbox && user == self.refuse_inbox_for {
            return Err(Error::Storage(sqlx::Error::Protocol(
                "injected delivery failure".into(),
            )));
        }
        self.inner.add_entry(conn, user, message, folder).await
    }

    async fn find_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> postbox_core::Result<Option<MailboxEntry>> {
        self.inner.find_entry(conn, user, message).await
    }

    async fn count_entries(
        &self,
        conn: &mut SqliteConnection,
        message: MessageId,
    ) -> postbox_core::Result<u64> {
        self.inner.count_entries(conn, message).await
    }

    async fn find_by_user_and_folder(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        folder: Option<Folder>,
    ) -> postbox_core::Result<Vec<MailboxEntry>> {
        self.inner.find_by_user_and_folder(conn, user, folder).await
    }

    async fn folder_summary(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
    ) -> postbox_core::Result<Vec<FolderSummary>> {
        self.inner.folder_summary(conn, user).await
    }

    async fn set_read(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> postbox_core::Result<()> {
        self.inner.set_read(conn, user, message).await
    }

    async fn set_deleted(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> postbox_core::Result<()> {
        self.inner.set_deleted(conn, user, message).await
    }

    async fn remove_entry(
        &self,
        conn: &mut SqliteConnection,
        user: UserId,
        message: MessageId,
    ) -> postbox_core::Result<()> {
        self.inner.remove_entry(conn, user, message).await
    }
}

/// Registered users minus one that this directory no longer knows.
struct ForgetfulDirectory {
    inner: UserRepository,
    forgotten: UserId,
}

impl IdentityDirectory for ForgetfulDirectory {
    async fn find_by_id(&self, id: UserId) -> postbox_core::Result<Option<User>> {
        if id == self.forgotten {
            return Ok(None);
        }
        self.inner.find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> postbox_core::Result<Option<User>> {
        let user = self.inner.find_by_email(email).await?;
        Ok(user.filter(|u| u.id != self.forgotten))
    }

    async fn find_all(&self) -> postbox_core::Result<Vec<User>> {
        let mut users = self.inner.find_all().await?;
        users.retain(|u| u.id != self.forgotten);
        Ok(users)
    }
}

struct World {
    db: Database,
    users: UserRepository,
    mail: MailService,
}

impl World {
    async fn new() -> Self {
        let db = Database::in_memory().await.unwrap();
        Self {
            users: UserRepository::new(&db),
            mail: MailService::sqlite(&db),
            db,
        }
    }

    async fn register(&self, name: &str, email: &str) -> UserId {
        self.users
            .create(&NewUser::new(name, "Tester", email))
            .await
            .unwrap()
            .id
    }

    async fn entries(&self, user: UserId, folder: Folder) -> Vec<MailboxEntry> {
        self.mail
            .find_by_user_and_folder(user, Some(folder))
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn send_creates_one_view_per_participant() {
    let world = World::new().await;
    let sender = world.register("Sam", "sam@x.com").await;
    let a = world.register("Ann", "ann@x.com").await;
    let b = world.register("Ben", "ben@x.com").await;

    let sent = world
        .mail
        .send(sender, &Composition::new(vec![a, b], "Hello", "Hi both"))
        .await
        .unwrap();

    let sent_box = world.entries(sender, Folder::Sent).await;
    assert_eq!(sent_box.len(), 1);
    assert_eq!(sent_box[0].message.id, sent.id);

    for user in [a, b] {
        let inbox = world.entries(user, Folder::Inbox).await;
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].message.id, sent.id);
        assert!(!inbox[0].is_read);
        assert!(!inbox[0].is_deleted);
    }
    assert!(world.entries(sender, Folder::Inbox).await.is_empty());
}

#[tokio::test]
async fn failed_delivery_rolls_back_the_whole_send() {
    let world = World::new().await;
    let sender = world.register("Sam", "sam@x.com").await;
    let a = world.register("Ann", "ann@x.com").await;
    let b = world.register("Ben", "ben@x.com").await;

    let failing = MailService::new(
        world.db.clone(),
        SqliteMessageStore::new(),
        FailingIndex {
            inner: SqliteMailboxIndex::new(),
            refuse_inbox_for: b,
        },
        world.users.clone(),
    );

    let err = failing
        .send(sender, &Composition::new(vec![a, b], "Hello", "Hi"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    assert!(world.mail.find_by_sender(sender).await.unwrap().is_empty());
    for user in [sender, a, b] {
        let all = world.mail.find_by_user_and_folder(user, None).await.unwrap();
        assert!(all.is_empty(), "user {user} kept an entry");
    }

    // The store is still usable after the rollback
    world
        .mail
        .send(sender, &Composition::new(vec![a, b], "Retry", "Hi"))
        .await
        .unwrap();
    assert_eq!(world.entries(b, Folder::Inbox).await.len(), 1);
}

#[tokio::test]
async fn sender_is_checked_against_the_service_directory() {
    let world = World::new().await;
    let sender = world.register("Sam", "sam@x.com").await;
    let reader = world.register("Rae", "rae@x.com").await;

    let mail = MailService::new(
        world.db.clone(),
        SqliteMessageStore::new(),
        SqliteMailboxIndex::new(),
        ForgetfulDirectory {
            inner: world.users.clone(),
            forgotten: sender,
        },
    );

    let err = mail
        .send(sender, &Composition::new(vec![reader], "Hi", ""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = mail
        .create_draft(sender, &Composition::new(vec![reader], "Hi", ""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    assert!(world.mail.find_by_sender(sender).await.unwrap().is_empty());
    assert!(world.entries(reader, Folder::Inbox).await.is_empty());

    // Drafts written before the sender became unknown cannot be sent either
    let draft = world
        .mail
        .create_draft(sender, &Composition::new(vec![reader], "Later", ""))
        .await
        .unwrap();
    let err = mail.send_draft(sender, draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(world.entries(sender, Folder::Drafts).await.len(), 1);
}

#[tokio::test]
async fn updating_a_draft_keeps_a_single_view() {
    let world = World::new().await;
    let me = world.register("Me", "me@x.com").await;
    let friend = world.register("Friend", "friend@x.com").await;

    let draft = world
        .mail
        .create_draft(me, &Composition::new(vec![], "Draft", "v1"))
        .await
        .unwrap();
    let updated = world
        .mail
        .update_draft(
            me,
            draft.id,
            &Composition::new(vec![friend], "Draft", "v2").with_cc(vec![friend]),
        )
        .await
        .unwrap();
    assert_eq!(updated.id, draft.id);

    let drafts = world.entries(me, Folder::Drafts).await;
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].message.body, "v2");
    assert_eq!(drafts[0].message.to, vec![friend]);
    assert_eq!(drafts[0].message.cc, vec![friend]);

    let all = world.mail.find_by_user_and_folder(friend, None).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn discarded_draft_is_gone() {
    let world = World::new().await;
    let me = world.register("Me", "me@x.com").await;

    let draft = world
        .mail
        .create_draft(me, &Composition::new(vec![], "Scratch", ""))
        .await
        .unwrap();
    world.mail.delete_draft(me, draft.id).await.unwrap();

    assert!(world.entries(me, Folder::Drafts).await.is_empty());
    let err = world.mail.find_message(draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = world.mail.delete_draft(me, draft.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn read_and_trash_flags_are_idempotent() {
    let world = World::new().await;
    let sender = world.register("Sam", "sam@x.com").await;
    let reader = world.register("Rae", "rae@x.com").await;

    let sent = world
        .mail
        .send(sender, &Composition::new(vec![reader], "Ping", ""))
        .await
        .unwrap();

    world.mail.mark_as_read(reader, sent.id).await.unwrap();
    world.mail.mark_as_read(reader, sent.id).await.unwrap();
    world.mail.mark_as_deleted(reader, sent.id).await.unwrap();
    world.mail.mark_as_deleted(reader, sent.id).await.unwrap();

    let inbox = world.entries(reader, Folder::Inbox).await;
    assert!(inbox[0].is_read);
    assert!(inbox[0].is_deleted);

    let stranger = world.register("Stu", "stu@x.com").await;
    let err = world.mail.mark_as_read(stranger, sent.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn duplicate_view_is_a_conflict() {
    let world = World::new().await;
    let sender = world.register("Sam", "sam@x.com").await;
    let reader = world.register("Rae", "rae@x.com").await;
    let sent = world
        .mail
        .send(sender, &Composition::new(vec![reader], "Once", ""))
        .await
        .unwrap();

    let index = SqliteMailboxIndex::new();
    let mut conn = world.db.acquire().await.unwrap();
    let err = index
        .add_entry(&mut conn, reader, sent.id, Folder::Inbox)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn deleted_users_degrade_reads() {
    let world = World::new().await;
    let sender = world.register("Sam", "sam@x.com").await;
    let kept = world.register("Kim", "kim@x.com").await;
    let gone = world.register("Gus", "gus@x.com").await;

    let sent = world
        .mail
        .send(sender, &Composition::new(vec![kept, gone], "Hi", ""))
        .await
        .unwrap();

    world.users.delete(gone).await.unwrap();
    let resolved = world.mail.resolve(&sent).await.unwrap();
    let to: Vec<UserId> = resolved.to.iter().map(|u| u.id).collect();
    assert_eq!(to, vec![kept]);

    world.users.delete(sender).await.unwrap();
    let inbox = world.entries(kept, Folder::Inbox).await;
    let resolved = world.mail.resolve(&inbox[0].message).await.unwrap();
    assert!(resolved.sender.is_none());
    assert_eq!(resolved.subject, "Hi");
}

#[tokio::test]
async fn history_feeds_autocomplete() {
    let world = World::new().await;
    let me = world.register("Me", "me@x.com").await;
    for (name, email) in [("Ana", "ana@x.com"), ("Banana", "banana@x.com"), ("Dana", "dana@x.com")]
    {
        world.register(name, email).await;
    }

    let history = AddressHistory::new(world.users.clone());
    let suggestions = history.search(me, "ana", 2).await.unwrap();
    assert_eq!(suggestions[0], "ana@x.com");
    assert_eq!(suggestions.len(), 2);
    assert_ne!(suggestions[1], "ana@x.com");

    let lookup = world
        .mail
        .lookup_recipients(["dana@x.com", "dana@x.com", "ana@x.com"])
        .await
        .unwrap();
    let to: Vec<UserId> = lookup.found.iter().map(|u| u.id).collect();
    world
        .mail
        .send(me, &Composition::new(to, "Lunch", ""))
        .await
        .unwrap();
    history.record_usage(me, lookup.found.iter().map(|u| u.email.as_str()));
    history.record_usage(me, ["DANA@x.com"]);

    assert_eq!(history.top_frequent(me, 2), vec!["dana@x.com", "ana@x.com"]);
    assert_eq!(
        history.search(me, "ana", 3).await.unwrap(),
        vec!["ana@x.com", "dana@x.com", "banana@x.com"]
    );
}
