use kairos::{Command, Notifier, Reply, TimerConfig, TimerState, Worker, WorkerError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Default)]
struct Recorder(Mutex<Vec<String>>);

impl Notifier for Recorder {
    fn notify(&self, message: &str) {
        self.0.lock().expect("lock notifications").push(message.to_string());
    }
}

impl Recorder {
    fn messages(&self) -> Vec<String> {
        self.0.lock().expect("lock notifications").clone()
    }
}

fn short_periods() -> TimerConfig {
    TimerConfig {
        work_period: 1,
        rest_period: 1,
        long_rest_period: 2,
        max_work_streak: 2,
        ..TimerConfig::default()
    }
}

fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test(start_paused = true)]
async fn set_tasks_round_trip() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();

    sender.set_tasks(labels(&["a", "b", "c"])).unwrap();
    assert_eq!(sender.tasks().await.unwrap(), vec!["a", "b", "c"]);

    sender.set_tasks(labels(&["b", "b"])).unwrap();
    assert_eq!(sender.tasks().await.unwrap(), vec!["b", "b"]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_enables_timer_immediately() {
    let recorder = Arc::new(Recorder::default());
    let handle = Worker::spawn(TimerConfig::default(), Some(recorder.clone()));
    let sender = handle.sender();

    sender.set_tasks(labels(&["only"])).unwrap();
    assert!(!sender.timer_enabled().await.unwrap());
    sender.start_timer(Some(0)).unwrap();
    assert!(sender.timer_enabled().await.unwrap());
    assert_eq!(sender.current_task().await.unwrap(), Some(0));
    assert_eq!(recorder.messages(), vec!["Kairos: Idle -> Working"]);

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn out_of_range_start_keeps_idle() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();

    sender.set_tasks(labels(&["a", "b"])).unwrap();
    sender.start_timer(Some(2)).unwrap();
    assert!(!sender.timer_enabled().await.unwrap());
    assert_eq!(sender.state().await.unwrap(), "Idle");

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn state_line_reports_task_and_elapsed() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();

    sender.set_tasks(labels(&["a", "b", "c"])).unwrap();
    sender.start_timer(Some(2)).unwrap();
    tokio::time::sleep(Duration::from_secs(90)).await;

    let state = sender.state().await.unwrap();
    assert!(state.contains("task 2"), "{state}");
    assert!(state.contains("01:30"), "{state}");

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn cycles_through_rest_and_long_rest() {
    let recorder = Arc::new(Recorder::default());
    let handle = Worker::spawn(short_periods(), Some(recorder.clone()));
    let sender = handle.sender();

    sender.set_tasks(labels(&["focus"])).unwrap();
    sender.start_timer(None).unwrap();

    tokio::time::sleep(Duration::from_secs(61)).await;
    let status = sender.status().await.unwrap();
    assert_eq!(status.state, TimerState::Resting);
    assert_eq!(status.work_streak, 1);
    assert_eq!(sender.tasks().await.unwrap(), vec!["focus*"]);
    assert!(sender.state().await.unwrap().starts_with("Resting - "));

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(sender.status().await.unwrap().state, TimerState::Working);

    tokio::time::sleep(Duration::from_secs(60)).await;
    let status = sender.status().await.unwrap();
    assert_eq!(status.state, TimerState::LongResting);
    assert_eq!(status.work_streak, 0);
    assert_eq!(status.total, 120);
    assert_eq!(sender.tasks().await.unwrap(), vec!["focus**"]);
    // Long rests read the same as short ones.
    assert!(sender.state().await.unwrap().starts_with("Resting - "));

    tokio::time::sleep(Duration::from_secs(121)).await;
    assert_eq!(sender.status().await.unwrap().state, TimerState::Working);

    assert_eq!(
        recorder.messages(),
        vec![
            "Kairos: Idle -> Working",
            "Kairos: Working -> Resting",
            "Kairos: Resting -> Working",
            "Kairos: Working -> Long Resting",
            "Kairos: Long Resting -> Working",
        ]
    );

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn huge_period_from_the_wire_keeps_worker_alive() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();
    let request = kairos_ipc::Request::new("set_work_period", serde_json::json!(u64::MAX / 2));
    let command = Command::from_request(&request);
    assert!(matches!(command, Command::SetWorkPeriod(_)), "{command:?}");

    sender.set_tasks(labels(&["a"])).unwrap();
    sender.send(command).unwrap();
    sender.start_timer(Some(0)).unwrap();
    assert!(sender.timer_enabled().await.unwrap());
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(sender.tasks().await.unwrap(), vec!["a"]);
    let status = sender.status().await.unwrap();
    assert_eq!(status.state, TimerState::Working);
    assert_eq!(status.total, u64::MAX);
    assert!(handle.is_alive());

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn restarting_from_a_rest_goes_back_to_work() {
    let recorder = Arc::new(Recorder::default());
    let handle = Worker::spawn(short_periods(), Some(recorder.clone()));
    let sender = handle.sender();

    sender.set_tasks(labels(&["a", "b"])).unwrap();
    sender.start_timer(Some(0)).unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(sender.status().await.unwrap().state, TimerState::Resting);

    sender.start_timer(Some(1)).unwrap();
    let status = sender.status().await.unwrap();
    assert_eq!(status.state, TimerState::Working);
    assert_eq!(status.current_task, 1);
    assert_eq!(status.elapsed, 0);
    // The streak from the finished work period survives the restart.
    assert_eq!(status.work_streak, 1);
    assert_eq!(
        recorder.messages().last().map(String::as_str),
        Some("Kairos: Resting -> Working")
    );

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn stop_twice_matches_stop_once() {
    let handle = Worker::spawn(short_periods(), None);
    let sender = handle.sender();

    sender.set_tasks(labels(&["a"])).unwrap();
    sender.start_timer(None).unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(sender.status().await.unwrap().work_streak, 1);

    sender.stop_timer().unwrap();
    let once = sender.status().await.unwrap();
    sender.stop_timer().unwrap();
    let twice = sender.status().await.unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.state, TimerState::Idle);
    assert_eq!(once.work_streak, 0);
    assert!(once.entered_at.is_none());

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn start_task_switches_when_running() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();

    sender.set_tasks(labels(&["a", "b", "c"])).unwrap();
    sender.start_task(1).await.unwrap();
    assert_eq!(sender.current_task().await.unwrap(), Some(1));
    tokio::time::sleep(Duration::from_secs(30)).await;

    sender.start_task(2).await.unwrap();
    assert_eq!(sender.current_task().await.unwrap(), Some(2));
    // Switching keeps the running interval.
    assert_eq!(sender.state().await.unwrap(), "Working on task 2 - 00:30");

    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn blocking_set_command_is_acknowledged() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let reply = handle
        .send_and_await(Command::SetWorkPeriod(50))
        .await
        .unwrap();
    assert_eq!(reply, Reply::Ack);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn commands_after_quit_fail_fast() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();

    assert_eq!(
        sender.send_and_await(Command::Quit).await.unwrap(),
        Reply::Ack
    );
    handle.join().await;

    assert!(!sender.is_alive());
    assert_eq!(sender.send(Command::StopTimer), Err(WorkerError::NotRunning));
    assert_eq!(sender.tasks().await, Err(WorkerError::NotRunning));
}

#[tokio::test(start_paused = true)]
async fn commands_queued_behind_quit_are_dropped() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();

    // Both land in the queue before the worker gets to run.
    sender.send(Command::Quit).unwrap();
    let late = sender.send_and_await(Command::GetTasks).await;
    assert_eq!(late, Err(WorkerError::NotRunning));

    handle.join().await;
}

#[tokio::test(start_paused = true)]
async fn stop_joins_the_worker() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();
    assert!(handle.is_alive());
    handle.stop().await;
    assert!(!sender.is_alive());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_switches_settle_on_a_sent_value() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();
    let tasks: Vec<String> = (0..16).map(|i| format!("task {i}")).collect();
    sender.set_tasks(tasks.clone()).unwrap();

    let mut joins = Vec::new();
    for index in 0..8usize {
        let sender = sender.clone();
        joins.push(tokio::spawn(async move {
            sender.switch_task(index).unwrap();
            sender.current_task().await.unwrap()
        }));
    }
    // Plain threads can feed the mailbox too.
    let threads: Vec<_> = (8..16usize)
        .map(|index| {
            let sender = sender.clone();
            std::thread::spawn(move || sender.switch_task(index).unwrap())
        })
        .collect();

    let sent: HashSet<Option<usize>> = (0..16).map(Some).collect();
    for join in joins {
        let seen = join.await.unwrap();
        assert!(sent.contains(&seen), "observed {seen:?}");
    }
    for thread in threads {
        thread.join().unwrap();
    }

    let settled = sender.current_task().await.unwrap();
    assert!(sent.contains(&settled));
    // Timer commands never disturb the task list.
    assert_eq!(sender.tasks().await.unwrap(), tasks);

    handle.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn task_list_reads_are_never_torn() {
    let handle = Worker::spawn(TimerConfig::default(), None);
    let sender = handle.sender();
    let first = labels(&["a", "b", "c"]);
    let second = labels(&["x", "y"]);
    sender.set_tasks(first.clone()).unwrap();

    let writer = {
        let sender = sender.clone();
        let (first, second) = (first.clone(), second.clone());
        tokio::spawn(async move {
            for round in 0..50 {
                let tasks = if round % 2 == 0 { &second } else { &first };
                sender.set_tasks(tasks.clone()).unwrap();
                sender.switch_task(0).unwrap();
                sender.timer_enabled().await.unwrap();
            }
        })
    };
    for _ in 0..50 {
        let seen = sender.tasks().await.unwrap();
        assert!(seen == first || seen == second, "torn read {seen:?}");
    }
    writer.await.unwrap();

    // The writer's last round (49) set `first`.
    assert_eq!(sender.tasks().await.unwrap(), first);
    handle.stop().await;
}
