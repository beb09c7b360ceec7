//! Lazy, page-at-a-time search results.

// crates.io
use futures::{Stream, stream};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	api::{ApiClient, types::SearchQuery},
	auth::AccountId,
	http::HttpTransport,
	oauth::TransportErrorMapper,
	obs::CallKind,
};

impl<C, M> ApiClient<C, M>
where
	C: ?Sized + HttpTransport,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Streams the rows of `query` one page at a time.
	///
	/// Nothing is fetched until the stream is polled. Each page is a full search call and
	/// consumes one operation. The stream ends after the page without a `nextPageToken`, or
	/// right after yielding an error. Dropping it between pages has no side effects.
	pub fn stream<'a, T>(
		&'a self,
		account: &'a AccountId,
		query: SearchQuery,
	) -> impl Stream<Item = Result<Vec<T>>> + 'a
	where
		T: 'a + DeserializeOwned,
	{
		stream::try_unfold(Some(query), move |next| async move {
			let Some(query) = next else {
				return Ok(None);
			};
			let page = self.search_as::<T>(CallKind::StreamPage, account, &query).await?;
			let next = page
				.next_page_token
				.filter(|token| !token.is_empty())
				.map(|token| query.with_page_token(token));

			Ok::<_, Error>(Some((page.results, next)))
		})
	}
}
