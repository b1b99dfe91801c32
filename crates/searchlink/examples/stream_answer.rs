use std::time::Duration;

use searchlink::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

    let mut stream = client
        .answer_stream(&AnswerRequest::new("Explain server-sent events.").include_sources(true))
        .await?;

    while let Some(event) = stream.next_event().await {
        match event {
            Ok(event) if event.is_done() => println!(),
            Ok(event) => {
                if let Some(text) = event.content() {
                    print!("{text}");
                }
            }
            Err(err) => {
                eprintln!("stream error ({}): {err}", err.kind());
                break;
            }
        }
    }
    Ok(())
}
