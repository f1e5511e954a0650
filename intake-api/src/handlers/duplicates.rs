use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Result as ActixResult};
use shared_types::{
    DuplicateSearchResponse, FalsePositiveRequest, MergePlanResponse, SubmitMergeRequest,
};
use std::sync::Arc;

use super::{error_response, intake_error};
use crate::dedup::{DispositionTracker, MergeWait, SearchCoordinator, SearchOutcome};

pub async fn find_duplicates(
    coordinator: web::Data<Arc<SearchCoordinator>>,
    path: web::Path<i64>,
) -> ActixResult<HttpResponse> {
    let subject_id = path.into_inner();

    match coordinator.search(subject_id).await.map_err(intake_error)? {
        SearchOutcome::Fresh(report) => {
            Ok(HttpResponse::Ok().json(DuplicateSearchResponse::from(report)))
        }
        SearchOutcome::Superseded { subject_id } => Err(error_response(
            StatusCode::CONFLICT,
            format!(
                "A newer duplicate search for contact {} replaced this one",
                subject_id
            ),
        )),
    }
}

pub async fn get_merge_plan(
    tracker: web::Data<Arc<DispositionTracker>>,
    path: web::Path<(i64, i64)>,
) -> ActixResult<HttpResponse> {
    let (subject_id, candidate_id) = path.into_inner();

    let selections = tracker
        .plan(subject_id, candidate_id)
        .await
        .map_err(intake_error)?;

    Ok(HttpResponse::Ok().json(MergePlanResponse {
        subject_id,
        candidate_id,
        selections,
    }))
}

pub async fn mark_false_positive(
    tracker: web::Data<Arc<DispositionTracker>>,
    path: web::Path<(i64, i64)>,
    request: Option<web::Json<FalsePositiveRequest>>,
) -> ActixResult<HttpResponse> {
    let (subject_id, candidate_id) = path.into_inner();
    let request = request.map(|r| r.into_inner()).unwrap_or_default();

    let pair = tracker
        .mark_false_positive(subject_id, candidate_id, request.resolved_by.as_deref())
        .await
        .map_err(intake_error)?;

    Ok(HttpResponse::Ok().json(pair))
}

pub async fn submit_merge(
    tracker: web::Data<Arc<DispositionTracker>>,
    path: web::Path<i64>,
    request: web::Json<SubmitMergeRequest>,
) -> ActixResult<HttpResponse> {
    let subject_id = path.into_inner();
    let request = request.into_inner();

    let pair = tracker
        .submit_merge(
            subject_id,
            request.candidate_id,
            request.selections.as_ref(),
            request.matched_on.as_deref(),
            request.notes.as_deref(),
            request.resolved_by.as_deref(),
        )
        .await
        .map_err(intake_error)?;

    // Follow the job in the background so the operator gets a completion notice.
    let tracker = tracker.get_ref().clone();
    let duplicate_id = pair.duplicate_id;
    tokio::spawn(async move {
        match tracker.wait_for_merge(duplicate_id).await {
            MergeWait::Done(status) => {
                tracing::info!("Merge {} finished as {}", duplicate_id, status.status.as_str())
            }
            MergeWait::StillRunning => tracing::info!("Merge {} still running", duplicate_id),
            MergeWait::TimedOut => {
                tracing::warn!("Gave up reading status of merge {}", duplicate_id)
            }
        }
    });

    Ok(HttpResponse::Accepted().json(pair))
}

pub async fn get_duplicate_status(
    tracker: web::Data<Arc<DispositionTracker>>,
    path: web::Path<i64>,
) -> ActixResult<HttpResponse> {
    let duplicate_id = path.into_inner();

    let status = tracker
        .merge_status(duplicate_id)
        .await
        .map_err(intake_error)?;

    Ok(HttpResponse::Ok().json(status))
}
