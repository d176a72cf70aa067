use crate::AppState;
use crate::api::templates::render_index;
use axum::{extract::State, response::Html};

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Upload form, disabled with a warning when tools are missing", content_type = "text/html")
    ),
    tag = "cleaner"
)]
pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state.dependencies.missing()))
}
