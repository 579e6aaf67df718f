//! The data endpoint seam and its typed helpers.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::{RestError, Result};
use crate::query::{Filter, Query, Returning};

/// Row-oriented access to the data endpoint.
///
/// Implemented by [`crate::RestClient`] over HTTP and by
/// [`crate::MemoryDataApi`] for tests. Rows travel as JSON objects; use
/// [`DataApiExt`] for typed access.
pub trait DataApi: Send + Sync {
    /// Read rows matching `query`.
    fn query(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// Create one row (object) or several (array). With
    /// [`Returning::Minimal`] the result is always empty.
    fn insert(
        &self,
        table: &str,
        rows: Value,
        returning: Returning,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// Merge `patch` into every row matching `filters`.
    fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
        returning: Returning,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// Remove every row matching `filters`.
    fn delete(
        &self,
        table: &str,
        filters: &[Filter],
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// A data endpoint that can act on behalf of an end user.
pub trait UserScoped: DataApi + Sized {
    /// Same endpoint, authorized with `access_token`. A blank token falls
    /// back to the anonymous credential.
    fn for_user(&self, access_token: &str) -> Self;
}

/// Decode JSON rows into `T`, failing on the first mismatch.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(|e| RestError::Decode(e.to_string())))
        .collect()
}

/// Typed wrappers over [`DataApi`].
pub trait DataApiExt: DataApi {
    fn select<T>(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move { decode_rows(self.query(query, cancel).await?) }
    }

    /// First decoded row, if any. Callers usually set `limit(1)`.
    fn select_first<T>(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            let rows = self.query(query, cancel).await?;
            Ok(decode_rows(rows)?.into_iter().next())
        }
    }

    /// Insert and decode the echoed rows; zero rows is `EmptyResult`.
    fn insert_returning<T, P>(
        &self,
        table: &str,
        payload: &P,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send,
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_value(payload);
        async move {
            let rows = self
                .insert(table, body?, Returning::Representation, cancel)
                .await?;
            if rows.is_empty() {
                return Err(RestError::EmptyResult(table.to_string()));
            }
            decode_rows(rows)
        }
    }

    /// Insert a single row and decode it.
    fn insert_one<T, P>(
        &self,
        table: &str,
        payload: &P,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<T>> + Send
    where
        T: DeserializeOwned + Send,
        P: Serialize + ?Sized,
    {
        let created = self.insert_returning::<T, P>(table, payload, cancel);
        async move {
            created
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| RestError::EmptyResult(table.to_string()))
        }
    }

    fn insert_minimal<P>(
        &self,
        table: &str,
        payload: &P,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_value(payload);
        async move {
            self.insert(table, body?, Returning::Minimal, cancel).await?;
            Ok(())
        }
    }

    /// Update and decode the echoed rows; zero matches is `EmptyResult`.
    fn update_returning<T, P>(
        &self,
        table: &str,
        filters: &[Filter],
        patch: &P,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send,
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_value(patch);
        async move {
            let rows = self
                .update(table, filters, body?, Returning::Representation, cancel)
                .await?;
            if rows.is_empty() {
                return Err(RestError::EmptyResult(table.to_string()));
            }
            decode_rows(rows)
        }
    }

    fn update_minimal<P>(
        &self,
        table: &str,
        filters: &[Filter],
        patch: &P,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_value(patch);
        async move {
            self.update(table, filters, body?, Returning::Minimal, cancel)
                .await?;
            Ok(())
        }
    }

    /// Delete rows matching a single equality.
    fn delete_where(
        &self,
        table: &str,
        column: &str,
        value: impl ToString,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<()>> + Send {
        let filters = vec![Filter::eq(column, value)];
        async move { self.delete(table, &filters, cancel).await }
    }
}

impl<A: DataApi> DataApiExt for A {}
