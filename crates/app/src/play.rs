use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::StartRequest;
use services::{FlowOutcome, HttpQuizClient, Phase, QuizFlow, StatsApi, TickOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::warn;

use crate::render;

const TICK: Duration = Duration::from_secs(1);

/// A line typed at the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Choose(usize),
    Next,
    Reveal,
    Finish,
    Report(String),
    Quit,
    Help,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if let Ok(number) = line.parse::<usize>() {
            return Some(Self::Choose(number));
        }
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(command, rest)| (command, rest.trim()));
        Some(match command {
            "n" | "next" => Self::Next,
            "s" | "show" => Self::Reveal,
            "f" | "finish" => Self::Finish,
            "r" | "report" => Self::Report(rest.to_string()),
            "q" | "quit" => Self::Quit,
            "h" | "help" | "?" => Self::Help,
            _ => Self::Unknown(line.to_string()),
        })
    }
}

fn ticker() -> Interval {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Play one session on stdin/stdout until it is finished or abandoned.
pub async fn run(client: Arc<HttpQuizClient>, request: StartRequest) -> Result<(), Box<dyn Error>> {
    let mut flow = QuizFlow::start(client.clone(), request).await?;
    println!(
        "Session {} started in {} mode.",
        flow.session().session_id(),
        flow.mode()
    );
    report_deferred_error(&mut flow);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut epoch = flow.question_epoch();
    let mut clock = ticker();
    print!("{}", render::question(&flow));

    let mut unclosed_noted = false;
    while !flow.is_settled() {
        if flow.question_epoch() != epoch {
            epoch = flow.question_epoch();
            clock = ticker();
            print!("{}", render::question(&flow));
        }
        let unclosed = flow.phase() == Phase::Finished;
        if unclosed && !unclosed_noted {
            println!("The session could not be closed. Type `f` to retry or `q` to leave.");
        }
        unclosed_noted = unclosed;
        let timed = flow.timer_running();

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    flow.abandon();
                    break;
                };
                if let Some(input) = Input::parse(&line) {
                    handle(&mut flow, input).await;
                }
            }
            _ = clock.tick(), if timed => {
                match flow.tick().await {
                    Ok(TickOutcome::Running(left)) if left <= 5 || left % 10 == 0 => {
                        println!("{left}s left");
                    }
                    Ok(TickOutcome::Expired) => println!("Time is up."),
                    Ok(_) => {}
                    Err(err) => println!("Could not move on: {err}"),
                }
            }
        }
        report_deferred_error(&mut flow);
    }

    match flow.phase() {
        Phase::Finished => show_results(client.as_ref(), &flow).await,
        _ => println!("Quiz abandoned."),
    }
    Ok(())
}

async fn handle(flow: &mut QuizFlow, input: Input) {
    let result = match input {
        Input::Choose(number) => choose(flow, number),
        Input::Next => flow.next().await.map(|outcome| {
            if outcome == FlowOutcome::Finished {
                println!("No more questions.");
            }
        }),
        Input::Reveal => flow.reveal().await.map(|correct| {
            match correct {
                Some(correct) => println!("Correct answer: {correct}"),
                None => println!("The service did not say which answer is correct."),
            }
            print!("{}", render::question(flow));
        }),
        Input::Finish => flow.finish().await,
        Input::Report(text) => flow
            .report_problem(&text)
            .await
            .map(|()| println!("Thanks, the problem was reported.")),
        Input::Quit => {
            flow.abandon();
            Ok(())
        }
        Input::Help => {
            let options = flow.question().map_or(0, |question| question.options.len());
            println!("{}", render::hint(flow.controls(), options));
            Ok(())
        }
        Input::Unknown(raw) => {
            println!("Unknown command {raw:?}. Type `h` for help.");
            Ok(())
        }
    };
    if let Err(err) = result {
        println!("{err}");
    }
}

fn choose(flow: &mut QuizFlow, number: usize) -> Result<(), services::FlowError> {
    let option = flow
        .question()
        .and_then(|question| question.options.get(number.wrapping_sub(1)))
        .cloned();
    let Some(option) = option else {
        println!("There is no option {number}.");
        return Ok(());
    };
    flow.select(&option)?;
    println!("Selected: {option}");
    Ok(())
}

fn report_deferred_error(flow: &mut QuizFlow) {
    if let Some(err) = flow.take_last_error() {
        println!("{err}");
    }
}

async fn show_results(stats: &dyn StatsApi, flow: &QuizFlow) {
    println!("Quiz finished.");
    match stats.quiz_results(flow.session().session_id()).await {
        Ok(results) => print!("{}", render::results(&results)),
        Err(err) => warn!(error = %err, "results are not available yet"),
    }
}
