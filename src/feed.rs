use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    error::{AppError, Result},
    models::{Post, PostStatus},
    repository::{PostQuery, RepositoryState},
};

pub const DEFAULT_PER_PAGE: i64 = 12;
pub const MAX_PER_PAGE: i64 = 100;

/// SortBy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Popularity,
}

/// SortOrder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// StatusConstraint
///
/// The status scope a caller context imposes on a feed. There is deliberately no
/// "any status" variant: the only mixed-status scope is bound to a single owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusConstraint {
    Only(PostStatus),
    /// Every status, restricted to posts of this owner.
    OwnerScope(i64),
}

/// FeedParams
///
/// Raw query parameters accepted by every feed endpoint.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedParams {
    /// Only posts of this category.
    pub category_id: Option<i64>,
    /// Only posts of this owner.
    pub user_id: Option<i64>,
    /// Case-insensitive substring over title or description.
    pub q: Option<String>,
    /// `date` (default) or `popularity`.
    pub sort_by: Option<String>,
    /// `asc` or `desc` (default).
    pub sort_order: Option<String>,
    /// 1-based page number, default 1.
    pub page: Option<i64>,
    /// Items per page, clamped to 1..=100, default 12.
    pub per_page: Option<i64>,
}

/// FeedFilter
///
/// The validated feed filter. A value object with no identity.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedFilter {
    pub category_id: Option<i64>,
    pub user_id: Option<i64>,
    pub search: Option<String>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub page: i64,
    pub per_page: i64,
}

impl Default for FeedFilter {
    fn default() -> Self {
        Self {
            category_id: None,
            user_id: None,
            search: None,
            sort_by: SortBy::Date,
            sort_order: SortOrder::Desc,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl FeedFilter {
    /// Normalises raw parameters: defaults applied, `page` floored at 1, `per_page`
    /// clamped to [1, 100], blank search dropped. Unknown sort values are rejected.
    pub fn from_params(params: FeedParams) -> Result<Self> {
        let sort_by = match params.sort_by.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("date") => SortBy::Date,
            Some("popularity") => SortBy::Popularity,
            Some(other) => {
                return Err(AppError::validation(
                    "sort_by",
                    format!("expected `date` or `popularity`, got `{}`", other),
                ));
            }
        };
        let sort_order = match params.sort_order.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(other) => {
                return Err(AppError::validation(
                    "sort_order",
                    format!("expected `asc` or `desc`, got `{}`", other),
                ));
            }
        };

        let search = params
            .q
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty());

        Ok(Self {
            category_id: params.category_id,
            user_id: params.user_id,
            search,
            sort_by,
            sort_order,
            page: params.page.unwrap_or(1).max(1),
            per_page: params
                .per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        })
    }
}

/// `ceil(total / per_page)`; zero items means zero pages.
pub fn total_pages(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 0;
    }
    (total + per_page - 1) / per_page
}

/// FeedResult
#[derive(Debug, Clone, Default)]
pub struct FeedResult {
    pub items: Vec<Post>,
    pub total: i64,
}

/// FeedEngine
///
/// Turns a validated filter plus a caller-imposed status constraint into a
/// bounded, counted result set. Owns the pagination and sorting semantics; ordering
/// is always completed by `id ASC` so identical inputs yield identical pages.
#[derive(Clone)]
pub struct FeedEngine {
    repo: RepositoryState,
}

impl FeedEngine {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn query(&self, filter: &FeedFilter, constraint: StatusConstraint) -> Result<FeedResult> {
        self.run(filter, constraint, None).await
    }

    /// Approved posts liked by `user_id`.
    pub async fn query_liked_by(&self, filter: &FeedFilter, user_id: i64) -> Result<FeedResult> {
        self.run(filter, StatusConstraint::Only(PostStatus::Approved), Some(user_id))
            .await
    }

    async fn run(
        &self,
        filter: &FeedFilter,
        constraint: StatusConstraint,
        liked_by: Option<i64>,
    ) -> Result<FeedResult> {
        if filter.per_page <= 0 {
            return Err(AppError::validation("per_page", "must be positive"));
        }
        if filter.page <= 0 {
            return Err(AppError::validation("page", "must be at least 1"));
        }
        let offset = (filter.page - 1)
            .checked_mul(filter.per_page)
            .ok_or_else(|| AppError::validation("page", "out of range"))?;

        let user_id = match constraint {
            StatusConstraint::OwnerScope(owner) => Some(owner),
            StatusConstraint::Only(_) => filter.user_id,
        };

        let query = PostQuery {
            status: constraint,
            category_id: filter.category_id,
            user_id,
            search: filter.search.clone(),
            liked_by,
            sort_by: filter.sort_by,
            sort_order: filter.sort_order,
            limit: filter.per_page,
            offset,
        };

        let (items, total) = self.repo.query_posts(&query).await?;
        tracing::debug!(
            returned = items.len(),
            total,
            page = filter.page,
            per_page = filter.per_page,
            "feed query"
        );

        Ok(FeedResult { items, total })
    }
}
