use std::str::FromStr;
use std::sync::{Arc, Mutex};

use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer, Result};
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::display::workload_lines;
use crate::export::{deliverable_file_name, materialize, write_deliverable, ScheduleRecord};
use crate::parser::{parse_date, read_stays};
use crate::planner::{plan_next_week, NoPlan, WeekPlan};
use crate::roster::{CachedRoster, CsvRoster};
use crate::schedule::{resolve_window, AssignmentPolicy, Stay};

/// Last uploaded report and the cached roster, shared by every worker
pub struct AppState {
    pub stays: Mutex<Option<Arc<Vec<Stay>>>>,
    pub roster: CachedRoster<CsvRoster>,
    pub config: AppConfig,
    pub admin_password: String,
}

impl AppState {
    pub fn new(config: AppConfig, admin_password: String) -> Self {
        let roster = CachedRoster::new(
            CsvRoster::new(config.server.roster_path.clone()),
            Duration::seconds(config.server.roster_ttl_secs),
        );
        Self {
            stays: Mutex::new(None),
            roster,
            config,
            admin_password,
        }
    }

    /// The uploaded stays, released from the lock before any planning starts
    pub fn current_stays(&self) -> Result<Option<Arc<Vec<Stay>>>> {
        let stays = self
            .stays
            .lock()
            .map_err(|_| actix_web::error::ErrorInternalServerError("Report lock poisoned"))?;
        Ok(stays.clone())
    }
}

#[derive(Deserialize)]
pub struct WeeksQuery {
    date: Option<String>,
}

#[derive(Deserialize)]
pub struct ScheduleQuery {
    date: Option<String>,
    policy: Option<String>,
}

#[derive(Serialize)]
pub struct ScheduleResponse {
    #[serde(flatten)]
    plan: WeekPlan,
    workload: Vec<String>,
    records: Vec<ScheduleRecord>,
}

fn error_body(message: impl Into<String>) -> serde_json::Value {
    serde_json::json!({"success": false, "error": message.into()})
}

fn reference_date(raw: Option<&str>) -> std::result::Result<NaiveDate, HttpResponse> {
    match raw {
        None => Ok(Local::now().date_naive()),
        Some(value) => parse_date(value).ok_or_else(|| {
            HttpResponse::BadRequest().json(error_body(format!("Invalid date '{}'", value)))
        }),
    }
}

fn no_plan_response(reason: NoPlan) -> HttpResponse {
    HttpResponse::NotFound().json(error_body(reason.to_string()))
}

/// Runs the planner against the uploaded stays and the current roster
fn plan_for(
    state: &AppState,
    today: NaiveDate,
    policy: Option<AssignmentPolicy>,
) -> Result<std::result::Result<WeekPlan, HttpResponse>> {
    let Some(stays) = state.current_stays()? else {
        return Ok(Err(
            HttpResponse::NotFound().json(error_body("No housekeeping report uploaded"))
        ));
    };

    let roster = match state.roster.snapshot() {
        Ok(roster) => roster,
        Err(e) => {
            error!("Failed to read roster: {}", e);
            return Ok(Err(HttpResponse::InternalServerError()
                .json(error_body(format!("Failed to read roster: {}", e)))));
        }
    };

    let mut options = state.config.engine_options();
    if let Some(policy) = policy {
        options.policy = policy;
    }

    Ok(plan_next_week(&stays, &roster, today, &state.config, &options).map_err(no_plan_response))
}

// Admin report upload endpoint
async fn upload_report(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let password = req
        .headers()
        .get("X-Admin-Password")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if password != state.admin_password {
        return Ok(HttpResponse::Unauthorized().json(error_body("Unauthorized")));
    }

    match read_stays(body.as_ref()) {
        Ok(report) => {
            info!("Uploaded report with {} stays", report.stays.len());
            let response = serde_json::json!({
                "success": true,
                "stays": report.stays.len(),
                "rejected": report.rejected,
                "skipped": report.skipped,
                "duplicates": report.duplicates,
            });
            let mut stays = state
                .stays
                .lock()
                .map_err(|_| actix_web::error::ErrorInternalServerError("Report lock poisoned"))?;
            *stays = Some(Arc::new(report.stays));
            state.roster.invalidate();
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => Ok(HttpResponse::BadRequest()
            .json(error_body(format!("Failed to process CSV: {}", e)))),
    }
}

async fn get_weeks(query: web::Query<WeeksQuery>, state: web::Data<AppState>) -> HttpResponse {
    let today = match reference_date(query.date.as_deref()) {
        Ok(date) => date,
        Err(response) => return response,
    };
    HttpResponse::Ok().json(resolve_window(today, &state.config.layout()))
}

async fn get_schedule(
    query: web::Query<ScheduleQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let today = match reference_date(query.date.as_deref()) {
        Ok(date) => date,
        Err(response) => return Ok(response),
    };
    let policy = match query.policy.as_deref().map(AssignmentPolicy::from_str) {
        None => None,
        Some(Ok(policy)) => Some(policy),
        Some(Err(e)) => return Ok(HttpResponse::BadRequest().json(error_body(e.to_string()))),
    };

    let plan = match plan_for(&state, today, policy)? {
        Ok(plan) => plan,
        Err(response) => return Ok(response),
    };

    Ok(HttpResponse::Ok().json(ScheduleResponse {
        workload: workload_lines(&plan.result.load),
        records: materialize(&plan.result.assignments),
        plan,
    }))
}

async fn get_schedule_csv(
    query: web::Query<WeeksQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let today = match reference_date(query.date.as_deref()) {
        Ok(date) => date,
        Err(response) => return Ok(response),
    };
    let plan = match plan_for(&state, today, None)? {
        Ok(plan) => plan,
        Err(response) => return Ok(response),
    };

    let mut body = Vec::new();
    write_deliverable(&plan.rows, &mut body)
        .map_err(|e| actix_web::error::ErrorInternalServerError(format!("Failed to write CSV: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            format!(
                "attachment; filename=\"{}\"",
                deliverable_file_name(&plan.window)
            ),
        ))
        .body(body))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/upload", web::post().to(upload_report))
        .route("/api/weeks", web::get().to(get_weeks))
        .route("/api/schedule", web::get().to(get_schedule))
        .route("/api/schedule.csv", web::get().to(get_schedule_csv));
}

pub async fn start_server(config: AppConfig, admin_password: String) -> std::io::Result<()> {
    let port = config.server.port;
    let app_state = web::Data::new(AppState::new(config, admin_password));

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;
    use std::io::Write;

    const REPORT: &str = "Unit_Code,Start_Date,Departure\n\
                          RR101,2026-10-15,2026-10-20\n\
                          RR101,2026-10-22,2026-10-25\n";

    const ROSTER: &str = "Unit_Code,Week,Ladder?,Filters,#\n\
                          RR101,3,No,1:(20 X 20 X 1),1\n";

    fn state(roster: &tempfile::NamedTempFile) -> web::Data<AppState> {
        let mut config = AppConfig::default();
        config.server.roster_path = roster.path().to_path_buf();
        web::Data::new(AppState::new(config, "secret".to_string()))
    }

    fn roster_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(ROSTER.as_bytes()).unwrap();
        file
    }

    #[actix_web::test]
    async fn upload_requires_password() {
        let roster = roster_file();
        let app = test::init_service(App::new().app_data(state(&roster)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/upload")
            .set_payload(REPORT)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn weeks_resolve_for_date() {
        let roster = roster_file();
        let app = test::init_service(App::new().app_data(state(&roster)).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/weeks?date=2026-10-14")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["current_index"], 2);
        assert_eq!(body["next_index"], 3);
        assert_eq!(body["next"]["start"], "2026-10-19");

        let req = test::TestRequest::get()
            .uri("/api/weeks?date=%2B262142-12-20")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let req = test::TestRequest::get()
            .uri("/api/weeks?date=someday")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn stays_are_read_without_holding_the_lock() {
        let roster = roster_file();
        let state = state(&roster);
        *state.stays.lock().unwrap() = Some(Arc::new(Vec::new()));

        let stays = state.current_stays().unwrap();
        assert!(stays.is_some());
        assert!(state.stays.try_lock().is_ok());
    }

    #[actix_web::test]
    async fn schedule_needs_an_uploaded_report() {
        let roster = roster_file();
        let app = test::init_service(App::new().app_data(state(&roster)).configure(routes)).await;

        let req = test::TestRequest::get()
            .uri("/api/schedule?date=2026-10-14")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn uploaded_report_drives_schedule_and_csv() {
        let roster = roster_file();
        let app = test::init_service(App::new().app_data(state(&roster)).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/upload")
            .insert_header(("X-Admin-Password", "secret"))
            .set_payload(REPORT)
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["stays"], 2);

        let req = test::TestRequest::get()
            .uri("/api/schedule?date=2026-10-14&policy=balanced")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["week"], 3);
        assert_eq!(body["records"][0]["unit"], "RR101");
        assert_eq!(body["records"][0]["date"], "2026-10-21");
        assert_eq!(body["workload"][2], "Wednesday 10/21/2026: 1");

        let req = test::TestRequest::get()
            .uri("/api/schedule?date=2026-10-14&policy=fastest")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let req = test::TestRequest::get()
            .uri("/api/schedule.csv?date=2026-10-14")
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.starts_with("Week,Date,Day,Unit_Code,Status,Ladder?,Filters,#"));
        assert!(text.contains("2026-10-21,Wednesday,RR101,VACANT"));
    }
}
