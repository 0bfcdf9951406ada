use crate::encoding::encode_body;
use crate::endpoint::Endpoint;
use crate::error::ApiResult;
use crate::policy::Policy;
use crate::transport::{BuiltRequest, RequestMeta};
use url::Url;

/// Resolves `path` below `base`, treating the base path as a directory so
/// `https://h/api` + `users` gives `https://h/api/users`. A leading `/` on
/// `path` does not escape the base path.
pub fn resolve_url(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut dir = base.clone();
    if !dir.cannot_be_a_base() && !dir.path().ends_with('/') {
        let p = format!("{}/", dir.path());
        dir.set_path(&p);
    }
    dir.set_query(None);
    dir.set_fragment(None);
    dir.join(path.trim_start_matches('/'))
}

/// Turns `ep` into a request against `base`. Neither `ep` nor `policy` is
/// modified; the only I/O is opening multipart file parts.
pub async fn build_request<E>(
    base: &Url,
    policy: &Policy,
    ep: &E,
    accept: Option<&'static str>,
) -> ApiResult<BuiltRequest>
where
    E: Endpoint + ?Sized,
{
    let mut url = resolve_url(base, &ep.path())?;
    let parameters = ep.parameters();
    let encoded = encode_body(&mut url, &ep.request_type(), &parameters).await?;
    let (headers, body, timeout) = policy.apply(accept, encoded);

    Ok(BuiltRequest {
        meta: RequestMeta {
            endpoint: ep.name(),
            method: ep.method(),
            authorized: ep.authorized(),
        },
        url,
        headers,
        body,
        timeout,
    })
}
