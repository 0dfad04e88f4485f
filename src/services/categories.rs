use super::char_len;
use crate::{
    error::{AppError, Result},
    models::Category,
    repository::{RepoError, RepositoryState},
};

pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 50;

/// generate_slug
///
/// Lowercases, turns spaces into dashes, drops anything outside `[a-z0-9-]`, then
/// collapses runs of dashes and trims them from both ends.
pub fn generate_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.to_lowercase().chars() {
        let c = if c == ' ' { '-' } else { c };
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
            continue;
        }
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('-').to_string()
}

fn validate_name(name: &str) -> Result<(String, String)> {
    let name = name.trim();
    let len = char_len(name);
    if !(NAME_MIN..=NAME_MAX).contains(&len) {
        return Err(AppError::validation(
            "name",
            format!("must be between {} and {} characters", NAME_MIN, NAME_MAX),
        ));
    }
    let slug = generate_slug(name);
    if slug.is_empty() {
        return Err(AppError::validation("name", "must contain at least one letter or digit"));
    }
    Ok((name.to_string(), slug))
}

fn slug_taken(slug: &str) -> AppError {
    AppError::conflict(format!("a category with slug `{}` already exists", slug))
}

/// CategoryService
#[derive(Clone)]
pub struct CategoryService {
    repo: RepositoryState,
}

impl CategoryService {
    pub fn new(repo: RepositoryState) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Category>> {
        Ok(self.repo.list_categories().await?)
    }

    pub async fn get(&self, id: i64) -> Result<Category> {
        self.repo
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Category {}", id)))
    }

    pub async fn create(&self, name: &str) -> Result<Category> {
        let (name, slug) = validate_name(name)?;
        if self.repo.slug_exists(&slug, None).await? {
            return Err(slug_taken(&slug));
        }
        let category = self
            .repo
            .create_category(&name, &slug)
            .await
            .map_err(|e| match e {
                RepoError::UniqueViolation(_) => slug_taken(&slug),
                other => other.into(),
            })?;
        tracing::info!(category_id = category.id, slug = %category.slug, "category created");
        Ok(category)
    }

    /// Renames a category; the slug is regenerated and must stay unique.
    pub async fn update(&self, id: i64, name: &str) -> Result<Category> {
        let (name, slug) = validate_name(name)?;
        self.get(id).await?;
        if self.repo.slug_exists(&slug, Some(id)).await? {
            return Err(slug_taken(&slug));
        }
        self.repo
            .update_category(id, &name, &slug)
            .await
            .map_err(|e| match e {
                RepoError::UniqueViolation(_) => slug_taken(&slug),
                other => other.into(),
            })?
            .ok_or_else(|| AppError::not_found(format!("Category {}", id)))
    }

    /// Refused with a Conflict while any post still references the category.
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.get(id).await?;
        let in_use = || AppError::conflict(format!("category {} still has posts", id));
        if self.repo.category_has_posts(id).await? {
            return Err(in_use());
        }
        let deleted = self.repo.delete_category(id).await.map_err(|e| match e {
            RepoError::ForeignKeyViolation(_) => in_use(),
            other => other.into(),
        })?;
        if !deleted {
            return Err(AppError::not_found(format!("Category {}", id)));
        }
        tracing::info!(category_id = id, "category deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_generation() {
        assert_eq!(generate_slug("Digital Art"), "digital-art");
        assert_eq!(generate_slug("  3D / Motion  "), "3d-motion");
        assert_eq!(generate_slug("UI--UX"), "ui-ux");
        assert_eq!(generate_slug("Café Photos!"), "caf-photos");
        assert_eq!(generate_slug("!!!"), "");
    }

    #[test]
    fn name_without_slug_characters_is_invalid() {
        assert!(matches!(
            validate_name("???"),
            Err(AppError::Validation { ref field, .. }) if field == "name"
        ));
        assert!(validate_name("a").is_err());
    }
}
