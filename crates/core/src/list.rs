//! Aggregation of several errors reported together (e.g. per-field validation).

use crate::error::AppError;

/// Ordered collection of errors. Append-only apart from [`ErrorList::clear`].
#[derive(Debug, Clone, Default)]
pub struct ErrorList {
    errors: Vec<AppError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: AppError) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AppError> {
        self.errors.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, AppError> {
        self.errors.iter_mut()
    }

    /// The only element, when there is exactly one.
    pub fn single(&self) -> Option<&AppError> {
        match self.errors.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Highest status among the contained errors; 200 when empty.
    pub fn http_status(&self) -> u16 {
        self.errors.iter().map(|e| e.http_status).max().unwrap_or(200)
    }

    /// `Ok(())` when empty, otherwise the list itself as the error.
    pub fn into_result(self) -> Result<(), ErrorList> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl core::fmt::Display for ErrorList {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.errors.as_slice() {
            [] => f.write_str("no errors"),
            [only] => core::fmt::Display::fmt(only, f),
            many => {
                write!(f, "{} errors: ", many.len())?;
                for (i, e) in many.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    core::fmt::Display::fmt(e, f)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ErrorList {}

impl From<AppError> for ErrorList {
    fn from(value: AppError) -> Self {
        Self { errors: vec![value] }
    }
}

impl FromIterator<AppError> for ErrorList {
    fn from_iter<I: IntoIterator<Item = AppError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl Extend<AppError> for ErrorList {
    fn extend<I: IntoIterator<Item = AppError>>(&mut self, iter: I) {
        self.errors.extend(iter);
    }
}

impl IntoIterator for ErrorList {
    type Item = AppError;
    type IntoIter = std::vec::IntoIter<AppError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a AppError;
    type IntoIter = std::slice::Iter<'a, AppError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
