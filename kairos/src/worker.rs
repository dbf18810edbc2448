//! The timer worker.
//!
//! One tokio task owns the task list, the timer configuration, the
//! automaton state and the notifier. Nothing else can reach them: callers
//! only hold a [`CommandSender`], so every read and write happens here, one
//! command at a time, and no lock is needed.
//!
//! Each loop iteration waits up to the poll interval for a command, drains
//! whatever else is queued, then evaluates the automaton once.

use crate::automaton;
use crate::channel::{command_channel, CommandReceiver, CommandSender, Envelope, Received};
use crate::command::{Command, Reply};
use crate::config::TimerConfig;
use crate::error::Result;
use crate::notifier::Notifier;
use chrono::{DateTime, Local};
use kairos_ipc::{TimerState, TimerStatus};
use std::ops::ControlFlow;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const STOP_MESSAGE: &str = "* -> Idle";

#[derive(Debug)]
pub struct Worker {
    tasks: Vec<String>,
    current_task: Option<usize>,
    config: TimerConfig,
    state: TimerState,
    entered_at: Option<Instant>,
    entered_at_wall: Option<DateTime<Local>>,
    work_streak: u32,
    notifier: Option<Arc<dyn Notifier>>,
}

/// Owner's handle on a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    sender: CommandSender,
    join: JoinHandle<()>,
}

impl Worker {
    pub fn new(config: TimerConfig, notifier: Option<Arc<dyn Notifier>>) -> Self {
        Self {
            tasks: Vec::new(),
            current_task: None,
            config,
            state: TimerState::Idle,
            entered_at: None,
            entered_at_wall: None,
            work_streak: 0,
            notifier,
        }
    }

    /// Start a worker on the current tokio runtime.
    pub fn spawn(config: TimerConfig, notifier: Option<Arc<dyn Notifier>>) -> WorkerHandle {
        let (sender, receiver) = command_channel(config.reply_timeout());
        let worker = Worker::new(config, notifier);
        let join = tokio::spawn(worker.run(receiver));
        WorkerHandle { sender, join }
    }

    pub async fn run(mut self, mut receiver: CommandReceiver) {
        info!(
            work = self.config.work_period,
            rest = self.config.rest_period,
            long_rest = self.config.long_rest_period,
            streak = self.config.max_work_streak,
            "timer worker started"
        );
        'poll: loop {
            let mut next = match receiver
                .receive_with_timeout(self.config.poll_interval())
                .await
            {
                Received::Command(envelope) => Some(envelope),
                Received::TimedOut => None,
                Received::Closed => {
                    debug!("all command senders dropped");
                    break 'poll;
                }
            };
            while let Some(envelope) = next {
                if self.dispatch(envelope).is_break() {
                    break 'poll;
                }
                next = receiver.try_receive();
            }
            let now = Instant::now();
            if catch_unwind(AssertUnwindSafe(|| self.tick(now))).is_err() {
                error!(state = %self.state, "timer tick panicked, falling back to Idle");
                self.reset_to_idle();
            }
        }
        info!("timer worker stopped");
    }

    fn dispatch(&mut self, envelope: Envelope) -> ControlFlow<()> {
        let (command, reply_slot) = envelope.into_parts();
        let flow = if matches!(command, Command::Quit) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        };
        let name = command.name().to_string();
        let now = Instant::now();
        let Ok(reply) = catch_unwind(AssertUnwindSafe(|| self.handle(command, now))) else {
            // The reply slot is dropped, so a waiting caller gets an error.
            error!(command = %name, "command handler panicked");
            return flow;
        };
        if let Some(slot) = reply_slot {
            if slot.send(reply).is_err() {
                debug!("caller stopped waiting for its reply");
            }
        }
        flow
    }

    /// Apply one command.
    pub fn handle(&mut self, command: Command, now: Instant) -> Reply {
        match command {
            Command::SetTasks(tasks) => {
                self.tasks = tasks;
                if self.current_task.is_some_and(|i| i >= self.tasks.len()) {
                    info!("current task no longer exists, clearing selection");
                    self.current_task = None;
                }
            }
            Command::GetTasks => return Reply::Tasks(self.tasks.clone()),
            Command::GetCurrentTask => return Reply::CurrentTask(self.current_task),
            Command::SetWorkPeriod(minutes) => {
                if self.accept_positive("set_work_period", minutes) {
                    self.config.work_period = minutes;
                }
            }
            Command::SetRestPeriod(minutes) => {
                if self.accept_positive("set_rest_period", minutes) {
                    self.config.rest_period = minutes;
                }
            }
            Command::SetLongRestPeriod(minutes) => {
                if self.accept_positive("set_long_rest_period", minutes) {
                    self.config.long_rest_period = minutes;
                }
            }
            Command::SetMaxWorkStreak(streak) => {
                if self.accept_positive("set_max_work_streak", u64::from(streak)) {
                    self.config.max_work_streak = streak;
                }
            }
            Command::SetProgressSymbol(symbol) => {
                if self.accept_symbol("set_progress_symbol", &symbol) {
                    self.config.progress_symbol = symbol;
                }
            }
            Command::SetSquashSymbol(symbol) => self.config.squash_symbol = symbol,
            Command::SetNotifier(notifier) => {
                debug!(present = notifier.is_some(), "replacing notifier");
                self.notifier = notifier;
            }
            Command::StartTimer(index) => self.start_timer(index.unwrap_or(0), now),
            Command::StopTimer => self.stop_timer(),
            Command::TimerEnabled => return Reply::Enabled(!self.state.is_idle()),
            Command::SwitchTask(index) => {
                if index < self.tasks.len() {
                    self.current_task = Some(index);
                } else {
                    warn!(index, tasks = self.tasks.len(), "switch_task: index out of range");
                }
            }
            Command::GetState => return Reply::State(self.describe(now)),
            Command::GetStatus => return Reply::Status(self.status(now)),
            Command::Quit => debug!("quit requested"),
            Command::Unknown { name } => {
                warn!(command = %name, "unknown command");
                self.notify(&format!("Unknown command: {name}"));
            }
            Command::Invalid { name, reason } => self.reject(&name, &reason),
        }
        Reply::Ack
    }

    /// Evaluate the automaton once at `now`.
    pub fn tick(&mut self, now: Instant) {
        let from = self.state;
        if !from.is_idle() && self.current_label().is_none() {
            warn!(state = %from, "no current task while running, falling back to Idle");
            self.reset_to_idle();
            self.notify(&format!("{from} -> Idle"));
            return;
        }

        let elapsed = self.entered_at.map(|t| now.saturating_duration_since(t));
        let step = automaton::advance(from, elapsed, &self.config, self.work_streak);
        self.work_streak = step.work_streak;
        if step.work_completed {
            let mark = self.config.progress_symbol.clone();
            self.mark_current_task(&mark);
        }
        if step.next == from {
            return;
        }

        if step.next.is_idle() {
            warn!(state = %from, "no entry time recorded, falling back to Idle");
            self.reset_to_idle();
        } else {
            self.enter(step.next, now);
        }
        info!(from = %from, to = %step.next, streak = self.work_streak, "timer transition");
        self.notify(&format!("{from} -> {}", step.next));
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn work_streak(&self) -> u32 {
        self.work_streak
    }

    fn start_timer(&mut self, index: usize, now: Instant) {
        if index >= self.tasks.len() {
            warn!(index, tasks = self.tasks.len(), "start_timer: index out of range");
            return;
        }
        let from = self.state;
        self.current_task = Some(index);
        self.enter(TimerState::Working, now);
        if from == TimerState::Working {
            self.notify(&format!("Working: restarted on task {index}"));
        } else {
            self.notify(&format!("{from} -> Working"));
        }
    }

    fn stop_timer(&mut self) {
        if self.state == TimerState::Working && !self.config.squash_symbol.is_empty() {
            let mark = self.config.squash_symbol.clone();
            self.mark_current_task(&mark);
        }
        self.notify(STOP_MESSAGE);
        self.reset_to_idle();
    }

    fn enter(&mut self, state: TimerState, now: Instant) {
        self.state = state;
        self.entered_at = Some(now);
        self.entered_at_wall = Some(Local::now());
    }

    fn reset_to_idle(&mut self) {
        self.state = TimerState::Idle;
        self.entered_at = None;
        self.entered_at_wall = None;
        self.work_streak = 0;
    }

    fn current_label(&self) -> Option<&String> {
        self.current_task.and_then(|i| self.tasks.get(i))
    }

    fn mark_current_task(&mut self, mark: &str) {
        if let Some(label) = self.current_task.and_then(|i| self.tasks.get_mut(i)) {
            label.push_str(mark);
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.entered_at
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t))
    }

    fn current_task_wire(&self) -> i64 {
        self.current_task.map_or(-1, |i| i as i64)
    }

    fn describe(&self, now: Instant) -> String {
        match self.state {
            TimerState::Idle => "Idle".to_string(),
            TimerState::Working => format!(
                "Working on task {} - {}",
                self.current_task_wire(),
                format_elapsed(self.elapsed(now))
            ),
            TimerState::Resting | TimerState::LongResting => {
                format!("Resting - {}", format_elapsed(self.elapsed(now)))
            }
        }
    }

    fn status(&self, now: Instant) -> TimerStatus {
        let total = match self.state {
            TimerState::Idle => Duration::ZERO,
            TimerState::Working => self.config.work_period(),
            TimerState::Resting => self.config.rest_period(),
            TimerState::LongResting => self.config.long_rest_period(),
        };
        TimerStatus {
            state: self.state,
            current_task: self.current_task_wire(),
            work_streak: self.work_streak,
            elapsed: self.elapsed(now).as_secs(),
            total: total.as_secs(),
            entered_at: self.entered_at_wall,
        }
    }

    fn accept_positive(&self, name: &str, value: u64) -> bool {
        if value == 0 {
            self.reject(name, "must be positive");
            return false;
        }
        true
    }

    fn accept_symbol(&self, name: &str, symbol: &str) -> bool {
        if symbol.is_empty() {
            self.reject(name, "symbol must not be empty");
            return false;
        }
        true
    }

    fn reject(&self, name: &str, reason: &str) {
        warn!(command = name, reason, "ignoring command with invalid arguments");
        self.notify(&format!("Invalid arguments for {name}: {reason}"));
    }

    fn notify(&self, message: &str) {
        let message = format!("Kairos: {message}");
        match &self.notifier {
            Some(notifier) => {
                if catch_unwind(AssertUnwindSafe(|| notifier.notify(&message))).is_err() {
                    error!("notifier panicked while delivering {:?}", message);
                }
            }
            None => debug!("no notifier set, dropping {:?}", message),
        }
    }
}

/// Zero padded `mm:ss`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

impl WorkerHandle {
    /// A sender for other callers; it stays valid after the handle is gone.
    pub fn sender(&self) -> CommandSender {
        self.sender.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.sender.is_alive() && !self.join.is_finished()
    }

    pub fn send(&self, command: Command) -> Result<()> {
        self.sender.send(command)
    }

    pub async fn send_and_await(&self, command: Command) -> Result<Reply> {
        self.sender.send_and_await(command).await
    }

    /// Ask the worker to quit and wait for it to finish.
    pub async fn stop(self) {
        if self.sender.send(Command::Quit).is_err() {
            debug!("worker already gone");
        }
        if let Err(e) = self.join.await {
            error!("timer worker ended abnormally: {}", e);
        }
    }

    /// Wait for the worker to finish on its own, e.g. after a `quit` request.
    pub async fn join(self) {
        if let Err(e) = self.join.await {
            error!("timer worker ended abnormally: {}", e);
        }
    }
}
