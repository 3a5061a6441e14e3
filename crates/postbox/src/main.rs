//! `Postbox` - personal mail client
//!
//! Small command-line front end over `postbox-core`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use anyhow::{Context, bail};
use postbox_core::{
    AddressHistory, Composition, Config, Database, Folder, IdentityDirectory, MailService, NewUser,
    UserId, UserRepository,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "\
usage: postbox <command> [args]

commands:
  init                                 write the default config file
  users                                list registered users
  register <name> <email>              register a user
  send <from> <to,...> <subject> [body]
                                       send a message between registered users
  mailbox <email> [inbox|sent|drafts]  show a user's folders
  suggest <email> <prefix>             autocomplete a recipient address";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postbox=info,postbox_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = Config::load().await.context("loading config")?;
    if command == "init" {
        config.save().await.context("saving config")?;
        println!("Wrote {}", Config::default_path().display());
        return Ok(());
    }

    let db = Database::open(&config)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    info!("Using database {}", config.database_path.display());

    let users = UserRepository::new(&db);
    let mail = MailService::sqlite(&db);

    match (command.as_str(), &args[1..]) {
        ("users", []) => {
            for user in users.find_all().await? {
                println!("{:>4}  {:<6} {}", user.id, user.role.as_str(), user.display());
            }
        }
        ("register", [name, email]) => {
            let user = users.create(&NewUser::new(name.as_str(), "", email.as_str())).await?;
            println!("Registered {} as {}", user.display(), user.id);
        }
        ("send", [from, to, subject, rest @ ..]) => {
            let sender = require_user(&mail, from).await?;
            let lookup = mail.lookup_recipients(to.split(',')).await?;
            if !lookup.unknown.is_empty() {
                bail!("unknown recipient(s): {}", lookup.unknown.join(", "));
            }
            let to = lookup.found.iter().map(|u| u.id).collect();
            let message = mail
                .send(sender, &Composition::new(to, subject.as_str(), rest.join(" ")))
                .await?;
            println!("Sent message {}", message.id);
        }
        ("mailbox", [email, folder @ ..]) => {
            let user = require_user(&mail, email).await?;
            let folder = match folder {
                [] => None,
                [name] => Some(
                    Folder::parse(&name.to_uppercase())
                        .with_context(|| format!("unknown folder {name}"))?,
                ),
                _ => bail!("{USAGE}"),
            };

            for summary in mail.folder_summary(user).await? {
                println!(
                    "{:<8} {:>4} total {:>4} unread",
                    summary.folder.display_name(),
                    summary.total,
                    summary.unread
                );
            }
            println!();
            for entry in mail.find_by_user_and_folder(user, folder).await? {
                let resolved = mail.resolve(&entry.message).await?;
                let marker = match (entry.is_deleted, entry.is_read) {
                    (true, _) => 'D',
                    (false, false) => '*',
                    (false, true) => ' ',
                };
                println!(
                    "{marker} {:>4}  {}  {:<30}  {}",
                    resolved.id,
                    resolved.sent_at.format("%Y-%m-%d %H:%M"),
                    resolved.sender_display(),
                    resolved.subject
                );
            }
        }
        ("suggest", [email, prefix]) => {
            let user = require_user(&mail, email).await?;
            let history = AddressHistory::new(mail.directory().clone());
            for message in mail.find_sent_by_user(user).await? {
                let addresses = mail.resolve(&message).await?.to.into_iter().map(|u| u.email);
                history.record_usage(user, addresses);
            }
            for suggestion in history.search(user, prefix, config.autocomplete_limit).await? {
                println!("{suggestion}");
            }
        }
        _ => bail!("{USAGE}"),
    }

    Ok(())
}

async fn require_user(mail: &MailService, email: &str) -> anyhow::Result<UserId> {
    let lookup = mail.lookup_recipients([email]).await?;
    lookup
        .found
        .first()
        .map(|user| user.id)
        .with_context(|| format!("no registered user {email}"))
}
