use axum::extract::Query;
use serde::Deserialize;
use validator::Validate;

use crate::{
    api::{error::ApiError, response::ApiResponse},
    domain::PricePoint,
    forecast::{default_profiles, synthetic_year},
};

#[derive(Debug, Deserialize, Validate)]
pub struct SyntheticPriceQuery {
    #[validate(range(min = 2000, max = 2100))]
    pub year: i32,
}

/// GET /api/v1/prices/synthetic?year=2030
pub async fn synthetic_prices(
    Query(q): Query<SyntheticPriceQuery>,
) -> Result<ApiResponse<Vec<PricePoint>>, ApiError> {
    q.validate()?;
    let series = synthetic_year(q.year, &default_profiles())?;
    let points: Vec<PricePoint> = series.points().collect();
    let count = points.len();
    Ok(ApiResponse::success(points).with_count(count))
}
