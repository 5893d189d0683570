use std::time::Duration;

use remote::{Endpoint, InMemoryBackend, Remote};
use services::{TutorConfig, TutorEvent, TutorSession};
use tutor_core::feedback::TIMEOUT_PREFIX;
use tutor_core::model::QuizPhase;
use tutor_core::time::fixed_clock;

fn session(quiz_seconds: u32) -> (TutorSession, InMemoryBackend) {
    let backend = InMemoryBackend::new().with_clock(fixed_clock());
    let config = TutorConfig {
        quiz_duration_secs: quiz_seconds,
        event_capacity: 256,
        ..TutorConfig::default()
    };
    let session = TutorSession::builder(Remote::from_backend(backend.clone()))
        .config(config)
        .clock(fixed_clock())
        .build();
    (session, backend)
}

async fn present_keyword_quiz(session: &TutorSession, backend: &InMemoryBackend) {
    backend.push_text_reply("An array is an ordered list.");
    let turn = session.submit_turn("what is an array?").await.unwrap();
    assert!(turn.quiz_presented);
}

#[tokio::test(start_paused = true)]
async fn unanswered_quiz_times_out() {
    let (session, backend) = session(60);
    let mut events = session.subscribe();
    present_keyword_quiz(&session, &backend).await;

    tokio::time::sleep(Duration::from_millis(60_500)).await;

    let current = session.current_quiz().await.unwrap();
    assert_eq!(current.attempt.phase(), QuizPhase::TimedOut);
    let summary = session.summary().await;
    assert_eq!((summary.quiz_score, summary.total_quizzes), (0, 1));
    assert!(session.messages().last().unwrap().text().starts_with(TIMEOUT_PREFIX));
    // timeout counts as a miss for difficulty
    assert!((summary.state.difficulty().value() - 0.4).abs() < 1e-9);

    let mut ticks = 0;
    let mut timed_out = false;
    while let Ok(event) = events.try_recv() {
        match event {
            TutorEvent::QuizTick { .. } => ticks += 1,
            TutorEvent::QuizTimedOut { .. } => timed_out = true,
            _ => {}
        }
    }
    assert_eq!(ticks, 59);
    assert!(timed_out);

    let err = session.answer_quiz(0).await.unwrap_err();
    assert_eq!(err.kind(), tutor_core::ErrorKind::InvalidState);
}

#[tokio::test(start_paused = true)]
async fn answering_stops_the_timer() {
    let (session, backend) = session(60);
    present_keyword_quiz(&session, &backend).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    session.answer_quiz(0).await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    let summary = session.summary().await;
    assert_eq!((summary.quiz_score, summary.total_quizzes), (1, 1));
    assert!(
        !session
            .messages()
            .iter()
            .any(|m| m.text().starts_with(TIMEOUT_PREFIX))
    );
}

#[tokio::test(start_paused = true)]
async fn dismissed_quiz_never_times_out() {
    let (session, backend) = session(10);
    present_keyword_quiz(&session, &backend).await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    session.dismiss_quiz().await;
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert!(session.current_quiz().await.is_none());
    assert_eq!(session.summary().await.total_quizzes, 0);
    assert_eq!(backend.call_count(Endpoint::UpdateDifficulty), 0);
}

#[tokio::test(start_paused = true)]
async fn retry_after_timeout_gets_a_fresh_countdown() {
    let (session, backend) = session(5);
    present_keyword_quiz(&session, &backend).await;
    tokio::time::sleep(Duration::from_millis(5_500)).await;

    let retried = session.retry_quiz().await.unwrap();
    assert!(retried.attempt.is_presented());
    assert_eq!(retried.attempt.time_remaining_secs(), 5);

    session.answer_quiz(0).await.unwrap();
    let summary = session.summary().await;
    assert_eq!((summary.quiz_score, summary.total_quizzes), (1, 2));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_stops_its_countdown() {
    let (session, backend) = session(5);
    present_keyword_quiz(&session, &backend).await;
    drop(session);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.call_count(Endpoint::UpdateDifficulty), 0);
}

#[tokio::test(start_paused = true)]
async fn hints_never_run_past_the_last_one() {
    let (session, backend) = session(60);
    present_keyword_quiz(&session, &backend).await;
    for _ in 0..4 {
        session.reveal_hint().await;
    }
    let current = session.current_quiz().await.unwrap();
    let last = current.quiz.hints().len() - 1;
    assert_eq!(current.attempt.hint_index(), last);
    assert!(current.current_hint().is_some());
}
