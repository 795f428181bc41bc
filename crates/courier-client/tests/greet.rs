mod common;

use common::{DEADLINE_WORK, GREET_COUNT, Harness};
use core::time::Duration;
use courier_client::CallContext;
use courier_core::{Error, proto::greet::LongGreetRequest};

#[tokio::test(flavor = "multi_thread")]
async fn greet_uses_the_first_name() {
    let harness = Harness::start().await;
    let greeting = harness
        .greet()
        .greet(&CallContext::new(), "Stephane", "Maarek")
        .await;
    assert_eq!(greeting.as_deref(), Ok("Hello, Stephane"));
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn greet_many_times_numbers_each_greeting() {
    let harness = Harness::start().await;
    let greetings = harness
        .greet()
        .greet_many_times(CallContext::new(), "Ada")
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();

    let expected: Vec<_> = (0..GREET_COUNT)
        .map(|i| format!("hello, Ada{i} times."))
        .collect();
    let results: Vec<_> = greetings.into_iter().map(|g| g.result).collect();
    assert_eq!(results, expected);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn long_greet_combines_every_name() {
    let harness = Harness::start().await;
    let mut sender = harness.greet().long_greet(CallContext::new());
    for name in ["Stephane", "John", "Marc"] {
        sender
            .send(LongGreetRequest {
                first_name: name.to_owned(),
            })
            .await
            .unwrap();
    }
    let res = sender.finish().await.unwrap();
    assert_eq!(res.result, "Hello Stephane, Hello John, Hello Marc, ");
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn long_greet_of_nobody_is_empty() {
    let harness = Harness::start().await;
    let res = harness
        .greet()
        .long_greet(CallContext::new())
        .finish()
        .await
        .unwrap();
    assert_eq!(res.result, "");
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn greet_everyone_replies_per_name() {
    let harness = Harness::start().await;
    let names: Vec<String> = ["Stephane", "John", "Marc", "Patricia", "Piper"]
        .map(String::from)
        .to_vec();

    let replies = harness
        .greet()
        .greet_everyone(&CallContext::new(), names.clone(), Duration::from_millis(5))
        .await
        .unwrap();

    let expected: Vec<_> = names.iter().map(|n| format!("Hello, {n}")).collect();
    assert_eq!(replies, expected);
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn greet_with_deadline_succeeds_with_time_to_spare() {
    let harness = Harness::start().await;
    let ctx = CallContext::with_timeout(DEADLINE_WORK * 5);
    let greeting = harness.greet().greet_with_deadline(&ctx, "Grace").await;
    assert_eq!(greeting.as_deref(), Ok("Hello Grace"));
    harness.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn greet_with_deadline_times_out() {
    let harness = Harness::start().await;
    let ctx = CallContext::with_timeout(DEADLINE_WORK / 4);
    let err = harness
        .greet()
        .greet_with_deadline(&ctx, "Grace")
        .await
        .unwrap_err();
    assert_eq!(err, Error::DeadlineExceeded);
    harness.stop().await;
}
