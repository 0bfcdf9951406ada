use apikit_core::prelude::*;
use apikit_examples::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let base = url::Url::parse(HTTPBIN)?;
    let auth = Arc::new(BearerAuth::new("demo-token"));
    let api = ApiAdapter::new(base)
        .with_shared_delegate(auth.clone())
        .with_timeout(Duration::from_secs(30))
        .with_debug_level(DebugLevel::V)
        .with_debug_sink(StderrDebugSink);

    api.request(&Get).await?;

    let doc = api.request_response(&SampleJson).await?;
    println!("slideshow: {} ({} slides)", doc.slideshow.title, doc.slideshow.slides.len());

    let echo = api
        .request_response(&EchoUser {
            user: User {
                id: "u-1".into(),
                name: "Some Name".into(),
                age: 42,
            },
        })
        .await?;
    println!("echoed: {:?}", echo.json);

    let check = api.request_response(&Bearer).await?;
    println!("bearer: authenticated={} token={}", check.authenticated, check.token);

    match api.request(&Status(404)).await {
        Err(e) => println!("status/404: {e}"),
        Ok(()) => println!("status/404 unexpectedly succeeded"),
    }

    let err = api
        .response_task(&SampleJson, |task| task.cancel())
        .await
        .err();
    println!("cancelled: {}", err.is_some_and(|e| e.is_cancelled()));

    println!("running requests: {}", api.running_request_count());
    Ok(())
}
