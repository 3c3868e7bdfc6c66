use anyhow::Result;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use triage_client::config::{self, ClientConfig, SYNC_POLL_INTERVAL};
use triage_client::handlers::session_handler::{self, redirect_for, redirect_when_unauthorized, Screen};
use triage_client::models::chat::Role;
use triage_client::models::email::{format_emails, MailPreview};
use triage_client::models::reply::ReplyEmail;
use triage_client::{ApiError, BackendClient, ChatSession, Inbox, ReplySender};

const HELP: &str = "\
commands:
  login <email> <password>       signup <password> <confirm> <days>
  logout | me | sync
  threads | more | refresh       search <text> | clear
  open <thread-id> | show        done <thread-id> | archive <thread-id>
  reply <body>                   (replies to the latest email of the open thread)
  chat <question> | cite <n>     status
  help | quit";

struct App {
    client: BackendClient,
    screen: Screen,
    inbox: Inbox,
    chat: ChatSession,
    replies: ReplySender,
}

impl App {
    fn report(&mut self, err: &ApiError) {
        if !self.follow(redirect_for(err)) {
            println!("error: {}", err);
        }
    }

    fn follow(&mut self, redirect: Option<Screen>) -> bool {
        match redirect {
            Some(screen) => {
                self.screen = screen;
                println!("Session expired, please log in.");
                true
            }
            None => false,
        }
    }

    /// Prints the listing unless the last fetch found the session expired.
    fn show_inbox(&mut self) {
        if !self.follow(self.inbox.redirect()) {
            self.print_threads();
        }
    }

    fn print_threads(&self) {
        let visible = self.inbox.visible_threads();
        for thread in &visible {
            let mark = if thread.done { "x" } else { " " };
            println!("[{}] {:>6}  {}  | {}", mark, thread.id, thread.subject, thread.brief);
        }
        let store = self.inbox.store();
        println!(
            "{} shown, {} loaded, page {}{}",
            visible.len(),
            store.total_count(),
            store.current_page(),
            if store.has_more() { ", more available" } else { "" }
        );
        if let Some(err) = store.error() {
            println!("last load failed: {} (retry with `more` or `refresh`)", err);
        }
    }

    async fn open_inbox(&mut self) {
        self.screen = Screen::Inbox;
        self.inbox.refresh(&self.client).await;
        if self.follow(self.inbox.redirect()) {
            return;
        }
        if !self.chat.ensure_indexed(&self.client).await {
            if self.follow(redirect_when_unauthorized(self.chat.is_unauthorized())) {
                return;
            }
            if let Some(notice) = self.chat.status().and_then(|s| s.readiness_notice()) {
                println!("{}", notice);
            }
        }
        self.print_threads();
    }

    async fn handle(&mut self, command: &str, rest: &str) -> bool {
        let args: Vec<&str> = rest.split_whitespace().collect();
        match command {
            "help" => println!("{}", HELP),
            "quit" | "exit" => return false,
            "login" if args.len() == 2 => {
                match session_handler::login(&self.client, args[0], args[1]).await {
                    Ok(_) => self.open_inbox().await,
                    Err(message) => println!("{}", message),
                }
            }
            "signup" if args.len() == 3 => {
                let days = args[2].parse().unwrap_or(0);
                match session_handler::complete_signup(&self.client, args[0], args[1], days).await {
                    Ok(screen) => {
                        self.screen = screen;
                        println!("Setting up your inbox; run `sync` to wait for it.");
                    }
                    Err(message) => println!("{}", message),
                }
            }
            "logout" => {
                self.screen = session_handler::logout(&self.client).await;
                self.inbox = Inbox::new();
                self.chat = ChatSession::new();
                println!("Logged out.");
            }
            "me" => match self.client.current_user().await {
                Ok(user) => println!("{} ({}) [{}]", user.display_name(), user.email, user.initials()),
                Err(e) => self.report(&e),
            },
            "sync" => {
                println!("Waiting for the initial sync...");
                match session_handler::wait_for_sync(&self.client, SYNC_POLL_INTERVAL).await {
                    Screen::Inbox => self.open_inbox().await,
                    Screen::SyncFailed => println!("We couldn't fetch your emails. Please go back and try again."),
                    screen => self.screen = screen,
                }
            }
            _ if self.screen != Screen::Inbox => println!("Please log in first (`help` for commands)."),
            "threads" => self.print_threads(),
            "refresh" => {
                self.inbox.refresh(&self.client).await;
                self.show_inbox();
            }
            "more" => {
                if !self.inbox.load_more(&self.client).await && self.inbox.search().is_active() {
                    println!("Clear the search to load more threads.");
                }
                self.show_inbox();
            }
            "search" => {
                self.inbox.set_query(rest);
                self.print_threads();
            }
            "clear" => {
                self.inbox.clear_search();
                self.print_threads();
            }
            "open" if args.len() == 1 => match self.inbox.select(args[0]) {
                Some(thread) => println!("{} ({} emails)", thread.subject, thread.emails.len()),
                None => println!("No loaded thread {}", args[0]),
            },
            "show" => match self.inbox.selected_thread() {
                Some(thread) => {
                    for email in &thread.emails {
                        let preview = MailPreview::from(email);
                        println!("{} <{}> {}", preview.name, preview.email, if preview.read { "" } else { "(unread)" });
                    }
                    println!("{}", format_emails(&thread.emails));
                }
                None => println!("No thread open."),
            },
            "done" if args.len() == 1 => {
                if !self.inbox.mark_done(args[0]) {
                    println!("No loaded thread {}", args[0]);
                }
            }
            "archive" if args.len() == 1 => {
                if !self.inbox.archive(args[0]) {
                    println!("No loaded thread {}", args[0]);
                }
            }
            "reply" if !rest.trim().is_empty() => {
                let target = self.inbox.selected_thread()
                    .and_then(|t| t.latest_email().map(|e| (t.id.clone(), ReplyEmail::for_email(e))));
                match target {
                    Some((thread_id, draft)) => {
                        let draft = draft.with_body(rest.trim());
                        match self.replies.send(&self.client, &thread_id, &draft).await {
                            Ok(()) => println!("Reply sent: {}", draft.subject),
                            Err(e) => self.report(&e),
                        }
                    }
                    None => println!("Open a thread with at least one email first."),
                }
            }
            "status" => {
                self.chat.refresh_status(&self.client).await;
                if self.follow(redirect_when_unauthorized(self.chat.is_unauthorized())) {
                    return true;
                }
                match self.chat.status() {
                    Some(status) => println!(
                        "{} emails indexed, ai {}, {}",
                        status.indexed_emails,
                        if status.ai_enabled { "enabled" } else { "disabled" },
                        status.status
                    ),
                    None => println!("{}", self.chat.error().unwrap_or("status unavailable")),
                }
            }
            "chat" if !rest.trim().is_empty() => {
                if let Some(reply) = self.chat.send_message(&self.client, rest).await {
                    println!("{}", reply.content);
                    for (i, source) in reply.sources.iter().enumerate() {
                        println!("  [{}] {} from {} ({})", i + 1, source.subject, source.sender(), source.sent_at);
                    }
                }
                if self.follow(redirect_when_unauthorized(self.chat.is_unauthorized())) {
                    return true;
                }
                if let Some(banner) = self.chat.error() {
                    println!("! {}", banner);
                }
            }
            "cite" if args.len() == 1 => {
                let source = args[0].parse::<usize>().ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| {
                        self.chat.messages().iter().rev()
                            .find(|m| m.role == Role::Assistant)
                            .and_then(|m| m.sources.get(i))
                    })
                    .map(|s| s.thread_id.clone());
                match source {
                    Some(thread_id) => match self.inbox.open_citation(&self.client, &thread_id).await {
                        Ok(thread) => println!("{} ({} emails)", thread.subject, thread.emails.len()),
                        Err(e) => self.report(&e),
                    },
                    None => println!("No such source."),
                }
            }
            _ => println!("Unknown command; try `help`."),
        }
        true
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    config::init_logging();

    let client = BackendClient::new(ClientConfig::from_env()?)?;
    let (screen, user) = session_handler::landing_screen(&client).await;

    let mut app = App {
        client,
        screen,
        inbox: Inbox::new(),
        chat: ChatSession::new(),
        replies: ReplySender::new(),
    };

    match user {
        Some(user) => {
            println!("Welcome back, {}.", user.display_name());
            app.open_inbox().await;
        }
        None => println!("Not logged in. {}", HELP),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        if !app.handle(command, rest).await {
            break;
        }
    }

    info!("Session closed");
    Ok(())
}
