use std::fmt;

use remote::{HttpBackend, InMemoryBackend, Remote, RemoteConfig};
use services::{TutorConfig, TutorEvent, TutorSession};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tutor_core::model::{BookmarkId, MessageId, PauseId, Sender, TopicId};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidApiUrl { raw: String },
    InvalidChoice { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidApiUrl { raw } => write!(f, "invalid --api-url value: {raw}"),
            ArgsError::InvalidChoice { raw } => {
                write!(f, "answer must be an option number starting at 1, got {raw:?}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [--api-url <url>] [--token <token>] [--topic <name>] [--offline]");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TUTOR_API_URL, TUTOR_API_TOKEN, TUTOR_QUIZ_SECONDS, TUTOR_DEFAULT_TOPIC,");
    eprintln!("  TUTOR_DIFFICULTY_STEP, TUTOR_GREETING, RUST_LOG");
}

fn print_commands() {
    println!("Commands:");
    println!("  /answer <n>            answer the current quiz (1-based)");
    println!("  /hint                  reveal the next hint");
    println!("  /dismiss               close the current quiz");
    println!("  /retry                 retry the last quiz");
    println!("  /pause [reason]        pause the session");
    println!("  /resume <pause id>     resume a pause");
    println!("  /mode <visual|text|analogy>");
    println!("  /difficulty <delta>    e.g. 0.1 or -0.1");
    println!("  /topic <name>          change the conversation topic");
    println!("  /done <id> <title>     mark a topic completed");
    println!("  /review <id> ok|fail   record a topic review");
    println!("  /due                   list topics due for review");
    println!("  /bookmark <msg> <title>");
    println!("  /bookmarks             list saved bookmarks");
    println!("  /unbookmark <id>       delete a bookmark");
    println!("  /summary               print session statistics");
    println!("  /quit");
}

#[derive(Debug)]
struct Args {
    remote: Option<RemoteConfig>,
    topic: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut api_url = None;
        let mut token = None;
        let mut topic = None;
        let mut offline = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--api-url" => api_url = Some(require_value(args, "--api-url")?),
                "--token" => token = Some(require_value(args, "--token")?),
                "--topic" => topic = Some(require_value(args, "--topic")?),
                "--offline" => offline = true,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg).into()),
            }
        }

        let remote = if offline {
            None
        } else {
            let config = RemoteConfig::from_env()?
                .with_overrides(api_url.as_deref(), token)
                .map_err(|_| ArgsError::InvalidApiUrl {
                    raw: api_url.unwrap_or_default(),
                })?;
            Some(config)
        };

        Ok(Self { remote, topic })
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // a subscriber set elsewhere wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn print_event(event: &TutorEvent) {
    match event {
        TutorEvent::MessageAppended(message) => {
            let who = match message.sender() {
                Sender::User => return,
                Sender::Tutor => "tutor",
            };
            println!("[{}] {who}: {}", message.id(), message.text());
        }
        TutorEvent::QuizPresented {
            time_remaining_secs,
            ..
        } => println!("(quiz started, {time_remaining_secs}s on the clock)"),
        TutorEvent::QuizTick { remaining, .. } if *remaining % 10 == 0 || *remaining <= 5 => {
            println!("({remaining}s left)");
        }
        TutorEvent::Escalated { topic } => println!("(switching to {topic})"),
        TutorEvent::SessionPaused { pause_id } => println!("(paused, id {pause_id})"),
        TutorEvent::SessionResumed { .. } => println!("(resumed)"),
        TutorEvent::DifficultyChanged(difficulty) => {
            println!("(difficulty {:.2})", difficulty.value());
        }
        TutorEvent::ModeChanged(mode) => println!("(mode {mode})"),
        _ => {}
    }
}

async fn print_events(mut events: broadcast::Receiver<TutorEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event printer fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn show_quiz(session: &TutorSession) {
    let Some(current) = session.current_quiz().await else {
        return;
    };
    if !current.attempt.is_presented() {
        return;
    }
    println!("Q: {}", current.quiz.question());
    for (index, option) in current.quiz.options().iter().enumerate() {
        println!("  {}. {option}", index + 1);
    }
}

/// Maps a 1-based option number typed by the learner to an option index.
fn option_index(raw: &str) -> Result<usize, ArgsError> {
    raw.trim()
        .parse::<usize>()
        .ok()
        .and_then(|choice| choice.checked_sub(1))
        .ok_or_else(|| ArgsError::InvalidChoice {
            raw: raw.to_string(),
        })
}

/// Returns `false` when the loop should stop.
async fn handle_command(session: &TutorSession, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "/quit" | "/exit" => return Ok(false),
        "/help" => print_commands(),
        "/answer" => {
            let outcome = session.answer_quiz(option_index(rest)?).await?;
            println!("score {}/{}", outcome.score.correct(), outcome.score.total());
        }
        "/hint" => match session.reveal_hint().await.and_then(|q| q.current_hint().map(str::to_owned)) {
            Some(hint) => println!("hint: {hint}"),
            None => println!("no hint available"),
        },
        "/dismiss" => session.dismiss_quiz().await,
        "/retry" => {
            session.retry_quiz().await?;
            show_quiz(session).await;
        }
        "/pause" => {
            let reason = (!rest.is_empty()).then(|| rest.to_string());
            session.pause(reason).await?;
        }
        "/resume" => session.resume(rest.parse::<PauseId>()?).await?,
        "/mode" => {
            session.set_mode(rest).await?;
        }
        "/difficulty" => {
            session.set_difficulty(rest.parse::<f64>()?).await?;
        }
        "/topic" => session.set_topic(rest).await,
        "/done" => {
            let (id, title) = rest.split_once(' ').unwrap_or((rest, ""));
            let title = if title.trim().is_empty() { "Untitled" } else { title.trim() };
            let topic = session.complete_topic(id.parse::<TopicId>()?, title).await;
            println!("{} due in {} day(s)", topic.title(), topic.days_until_review(tutor_core::Clock::system().now()));
        }
        "/review" => {
            let (id, verdict) = rest.split_once(' ').unwrap_or((rest, "ok"));
            let success = !matches!(verdict.trim(), "fail" | "failed" | "no");
            let topic = session.mark_reviewed(id.parse::<TopicId>()?, success).await?;
            println!(
                "{}: {} review(s), {:.0}% success",
                topic.title(),
                topic.review_count(),
                topic.success_rate() * 100.0
            );
        }
        "/due" => {
            if let Err(err) = session.refresh_topics().await {
                warn!(%err, "could not refresh topics");
            }
            let now = tutor_core::Clock::system().now();
            for topic in session.due_topics().await {
                println!("  {} {} ({})", topic.topic_id(), topic.title(), topic.bucket(now).label());
            }
        }
        "/bookmark" => {
            let (id, title) = rest.split_once(' ').unwrap_or((rest, ""));
            let bookmark = session
                .bookmark_message(id.parse::<MessageId>()?, title, Vec::new())
                .await?;
            println!("saved bookmark {}", bookmark.id);
        }
        "/bookmarks" => {
            for bookmark in session.list_bookmarks().await? {
                println!("  {} {}", bookmark.id, bookmark.title);
            }
        }
        "/unbookmark" => session.delete_bookmark(rest.parse::<BookmarkId>()?).await?,
        "/summary" => println!("{}", serde_json::to_string_pretty(&session.summary().await)?),
        _ => println!("unknown command, try /help"),
    }
    Ok(true)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).inspect_err(|e| {
        eprintln!("{e}");
        print_usage();
    })?;

    let remote = match args.remote {
        Some(config) => {
            info!(base_url = %config.base_url, "using remote tutoring service");
            Remote::from_backend(HttpBackend::new(config))
        }
        None => {
            info!("running offline with scripted services");
            Remote::from_backend(InMemoryBackend::new())
        }
    };

    let mut config = TutorConfig::from_env();
    if config.greeting.is_none() {
        config = config.with_greeting("Hi! What would you like to learn today?");
    }
    if let Some(topic) = args.topic {
        config = config.with_default_topic(topic);
    }

    let session = TutorSession::new(remote, config);
    let printer = tokio::spawn(print_events(session.subscribe()));
    for message in session.messages() {
        println!("[{}] tutor: {}", message.id(), message.text());
    }
    if let Err(err) = session.refresh_state().await {
        warn!(%err, "could not load session state");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with('/') {
            match handle_command(&session, line).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(err) => eprintln!("error: {err}"),
            }
            continue;
        }
        match session.submit_turn(line).await {
            Ok(outcome) if outcome.quiz_presented => show_quiz(&session).await,
            Ok(_) => {}
            Err(err) => eprintln!("error: {err}"),
        }
    }

    drop(session);
    printer.abort();
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
