use minesweeper_common::{
    models::{BoardView, User},
    protocol::{ClickData, ErrorResponse, NewGame, NewUser},
};
use rocket::{
    Request, State, catch, delete, get,
    http::Status,
    post, put,
    response::{self, Responder},
    serde::json::Json,
};
use tracing::{error, info, instrument, warn};

use crate::{
    error::Error,
    logic::Game,
    rate_limit::{ClientIp, RateLimiter, check_rate_limit},
    service::GameService,
};

/// Error body plus the status it is sent with.
#[derive(Debug)]
pub struct ApiError {
    status: Status,
    body: ErrorResponse,
}

impl ApiError {
    fn rate_limited(status: Status) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: "rate_limited".to_string(),
                message: "Too many games created, try again later".to_string(),
            },
        }
    }
}

fn status_for(error: &Error) -> Status {
    match error {
        e if e.is_rule_violation() => Status::BadRequest,
        Error::InvalidUsername => Status::BadRequest,
        Error::NotFound(_) => Status::NotFound,
        Error::UserExists | Error::GameExists => Status::Conflict,
        _ => Status::InternalServerError,
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let status = status_for(&error);
        if status == Status::InternalServerError {
            error!("Request failed: {}", error);
        }
        Self {
            status,
            body: ErrorResponse {
                error: error.code().to_string(),
                message: error.to_string(),
            },
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        (self.status, Json(self.body)).respond_to(request)
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[post("/users", data = "<user>")]
#[instrument(level = "trace", skip(user, service), fields(username = %user.username))]
pub fn create_user(
    user: Json<NewUser>,
    service: &State<GameService>,
) -> ApiResult<(Status, Json<User>)> {
    let user = service.create_user(user.into_inner())?;
    Ok((Status::Created, Json(user)))
}

#[put("/games", data = "<params>")]
#[instrument(level = "trace", skip(service, rate_limiter, params), fields(client_ip = %client_ip.0, username = %params.username))]
pub async fn create_game(
    params: Json<NewGame>,
    service: &State<GameService>,
    rate_limiter: &State<RateLimiter>,
    client_ip: ClientIp,
) -> ApiResult<(Status, Json<Game>)> {
    info!(
        "Game creation request from {}: {:?}x{:?} with {:?} mines",
        client_ip.0, params.rows, params.cols, params.mines
    );

    if let Err(status) = check_rate_limit(rate_limiter, &client_ip) {
        warn!("Rate limit exceeded for client {}", client_ip.0);
        return Err(ApiError::rate_limited(status));
    }

    let game = service.create_game(params.into_inner()).await?;
    info!("Successfully created game {} for client {}", game.name, client_ip.0);
    Ok((Status::Created, Json(game)))
}

#[post("/games/<game>/<user>/click", data = "<data>")]
#[instrument(level = "trace", skip(service, data))]
pub async fn click(
    game: &str,
    user: &str,
    data: Json<ClickData>,
    service: &State<GameService>,
) -> ApiResult<Json<Game>> {
    Ok(Json(service.click(game, user, &data).await?))
}

#[get("/games/<game>/<user>")]
#[instrument(level = "trace", skip(service))]
pub fn get_game(game: &str, user: &str, service: &State<GameService>) -> ApiResult<Json<Game>> {
    Ok(Json(service.game(game, user)?))
}

#[get("/games/<game>/<user>/board")]
#[instrument(level = "trace", skip(service))]
pub fn get_board(
    game: &str,
    user: &str,
    service: &State<GameService>,
) -> ApiResult<Json<BoardView>> {
    Ok(Json(service.board(game, user)?))
}

#[delete("/games/<game>/<user>")]
#[instrument(level = "trace", skip(service))]
pub async fn delete_game(
    game: &str,
    user: &str,
    service: &State<GameService>,
) -> ApiResult<Status> {
    service.delete_game(game, user).await?;
    Ok(Status::NoContent)
}

fn catcher_code(status: Status) -> &'static str {
    match status.code {
        400 => "malformed_request",
        404 => "route_not_found",
        422 => "invalid_body",
        _ if status.class().is_server_error() => "internal_error",
        _ => "request_failed",
    }
}

/// Keeps failures Rocket raises itself (unknown routes, bodies that fail to
/// parse) in the same JSON envelope as [`ApiError`].
#[catch(default)]
pub fn default_catcher(status: Status, request: &Request<'_>) -> Json<ErrorResponse> {
    warn!("{} {} failed with {}", request.method(), request.uri(), status);
    Json(ErrorResponse {
        error: catcher_code(status).to_string(),
        message: status.reason().unwrap_or("Request failed").to_string(),
    })
}
