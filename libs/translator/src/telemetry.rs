use genie_client::GenieAnswer;
use metrics::counter;

const RENDER_SPAN_NAME: &str = "translate.render";
const RENDER_COUNTER: &str = "genie_answers_rendered_total";

fn answer_shape(answer: &GenieAnswer) -> &'static str {
    if answer.columns.is_some() && answer.rows.is_some() {
        "table"
    } else if answer.error.is_some() {
        "error"
    } else if answer.message.is_some() {
        "message"
    } else {
        "empty"
    }
}

pub fn render_with_span<T, F>(answer: &GenieAnswer, f: F) -> T
where
    F: FnOnce() -> T,
{
    let shape = answer_shape(answer);
    let span = tracing::debug_span!(
        RENDER_SPAN_NAME,
        shape,
        rows = answer.rows.as_ref().map(Vec::len).unwrap_or_default()
    );
    let _guard = span.enter();
    let result = f();
    counter!(RENDER_COUNTER, "shape" => shape).increment(1);
    result
}
