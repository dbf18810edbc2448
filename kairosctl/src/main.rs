use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use kairos_ipc::{read_message, write_message, IpcError, Request, Response, SOCKET_PATH};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

#[derive(Parser)]
#[command(name = "kairosctl")]
#[command(about = "Control the Kairos timer", long_about = None)]
struct Cli {
    /// Control socket of the running kairos daemon
    #[arg(short, long, default_value = SOCKET_PATH)]
    socket: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tasks, or replace them
    Tasks {
        /// New task labels, in order
        #[arg(long, num_args = 1.., conflicts_with = "file")]
        set: Option<Vec<String>>,
        /// Read tasks from a file, one per line; blank lines and # comments are skipped
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Start the timer on a task (the first one by default)
    Start { index: Option<usize> },
    /// Work on a task now, switching to it if the timer is already running
    Work { index: usize },
    /// Stop the timer
    Stop,
    /// Switch the current task without touching the timer
    Switch { index: usize },
    /// Print the timer state line
    State,
    /// Print a detailed timer status
    Status,
    /// Print whether the timer is running
    Enabled,
    /// Print the current task index
    Current,
    /// Set a period length in minutes
    Period { kind: PeriodKind, minutes: u64 },
    /// Set how many work periods come before a long rest
    Streak { count: u32 },
    /// Set the mark appended to tasks
    Symbol { kind: SymbolKind, symbol: String },
    /// Replace the notifier (none, log, desktop)
    Notifier {
        #[arg(default_value = "log")]
        kind: String,
        /// Run this shell command with the message instead
        #[arg(long)]
        command: Option<String>,
    },
    /// Shut the timer down
    Quit,
    /// Send a raw request
    Send {
        name: String,
        /// JSON arguments
        args: Option<String>,
        /// Wait for the reply
        #[arg(long)]
        block: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PeriodKind {
    Work,
    Rest,
    LongRest,
}

#[derive(Clone, Copy, ValueEnum)]
enum SymbolKind {
    Progress,
    Squash,
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::ConnectionRefused => {
                IpcError::ConnectionRefused
            }
            _ => IpcError::Io(e),
        })?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(reader),
            writer,
        })
    }

    async fn request(&mut self, request: &Request) -> Result<Response> {
        write_message(&mut self.writer, request).await?;
        let response = read_message(&mut self.reader)
            .await?
            .ok_or(IpcError::Closed)?;
        Ok(response)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut client = Client::connect(&cli.socket).await?;

    if let Commands::Work { index } = cli.command {
        let enabled = client
            .request(&Request::bare("timer_enabled").blocking())
            .await?;
        let name = match enabled {
            Response::Enabled(true) => "switch_task",
            Response::Enabled(false) => "start_timer",
            other => return print_response(other),
        };
        let response = client.request(&Request::new(name, json!(index))).await?;
        return print_response(response);
    }

    let request = build_request(cli.command)?;
    let response = client.request(&request).await?;
    print_response(response)
}

fn build_request(command: Commands) -> Result<Request> {
    let request = match command {
        Commands::Tasks {
            set: Some(tasks), ..
        } => Request::new("set_tasks", json!(tasks)),
        Commands::Tasks {
            file: Some(path), ..
        } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read task file {:?}", path))?;
            Request::new("set_tasks", json!(task_lines(&content)))
        }
        Commands::Tasks { .. } => Request::bare("get_tasks").blocking(),
        Commands::Start { index } => Request::new("start_timer", json!(index)),
        Commands::Work { index } => Request::new("start_timer", json!(index)),
        Commands::Stop => Request::bare("stop_timer"),
        Commands::Switch { index } => Request::new("switch_task", json!(index)),
        Commands::State => Request::bare("get_state").blocking(),
        Commands::Status => Request::bare("get_status").blocking(),
        Commands::Enabled => Request::bare("timer_enabled").blocking(),
        Commands::Current => Request::bare("get_current_task").blocking(),
        Commands::Period { kind, minutes } => {
            let name = match kind {
                PeriodKind::Work => "set_work_period",
                PeriodKind::Rest => "set_rest_period",
                PeriodKind::LongRest => "set_long_rest_period",
            };
            Request::new(name, json!(minutes))
        }
        Commands::Streak { count } => Request::new("set_max_work_streak", json!(count)),
        Commands::Symbol { kind, symbol } => {
            let name = match kind {
                SymbolKind::Progress => "set_progress_symbol",
                SymbolKind::Squash => "set_squash_symbol",
            };
            Request::new(name, json!(symbol))
        }
        Commands::Notifier {
            command: Some(command),
            ..
        } => Request::new("set_adaptor", json!({ "command": command })),
        Commands::Notifier { kind, .. } => Request::new("set_adaptor", json!(kind)),
        Commands::Quit => Request::bare("quit"),
        Commands::Send { name, args, block } => {
            let args = match args {
                Some(raw) => serde_json::from_str(&raw)
                    .with_context(|| format!("Arguments are not valid JSON: {raw}"))?,
                None => Value::Null,
            };
            Request {
                name,
                args,
                block,
            }
        }
    };
    Ok(request)
}

/// Task labels from a plain text file: trimmed, without blanks and `#` comments.
fn task_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect()
}

fn print_response(response: Response) -> Result<()> {
    match response {
        Response::Ok => println!("OK"),
        Response::Tasks(tasks) => {
            for (index, task) in tasks.iter().enumerate() {
                println!("{:>3}  {}", index, task);
            }
        }
        Response::CurrentTask(-1) => println!("none"),
        Response::CurrentTask(index) => println!("{}", index),
        Response::Enabled(enabled) => println!("{}", enabled),
        Response::State(state) => println!("{}", state),
        Response::Status(status) => {
            println!("State: {}", status.state);
            if status.current_task >= 0 {
                println!("Task: {}", status.current_task);
            }
            println!("Elapsed: {}s", status.elapsed);
            if status.total > 0 {
                println!("Remaining: {}s", status.total.saturating_sub(status.elapsed));
            }
            println!("Work streak: {}", status.work_streak);
            if let Some(since) = status.entered_at {
                println!("Since: {}", since.format("%Y-%m-%d %H:%M:%S"));
            }
        }
        Response::Error(e) => return Err(anyhow!(e)),
    }
    Ok(())
}
