use searchlink::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), ClientError> {
    searchlink::observability::init_observability("info");

    let client = Client::from_env()?;

    let results = client
        .search(&SearchRequest::new("tokio select cancellation safety").max_results(3))
        .await?;
    println!("{results:#}");

    let answer = client
        .answer_stream(&AnswerRequest::new("What does tokio::select! do?"))
        .await?
        .collect_text()
        .await?;
    println!("{answer}");
    Ok(())
}
