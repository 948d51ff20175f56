use crate::context::RequestUrl;
use crate::{
    Context, Error, IdentificationData, IdentificationDataCodec, Request, Result, TokenTransport,
};

/// Carries the session token in a query string parameter.
///
/// A new token is handed to the client by redirecting it to the url it requested,
/// with the token added to the query string. Every link of the application must carry the
/// parameter along, or the session is lost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryStringTransport {
    name: String,
}

impl QueryStringTransport {
    /// Carry the token in the parameter called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl TokenTransport for QueryStringTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn provide_data(
        &self,
        codec: &IdentificationDataCodec,
        request: &Request,
    ) -> Option<IdentificationData> {
        codec.provide_data(&request.query(), &self.name)
    }

    fn write_data(&self, data: &IdentificationData, context: &mut Context) -> Result {
        let location = session_aware_url(context.request.url(), &self.name, &data.to_string())?;
        context.response.redirect_to(location);
        Ok(())
    }
}

/// Returns `url` with the parameter `name` set to `value`.
///
/// An existing parameter called `name` is replaced in place, and later duplicates of it are dropped.
/// Otherwise the parameter is appended. The other parameters keep their order, and the fragment is kept.
fn session_aware_url(url: &str, name: &str, value: &str) -> Result<String> {
    let mut url = RequestUrl::parse(url).map_err(Error::InvalidUrl)?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (pair_name, pair_value) in url.url().query_pairs().into_owned() {
        if pair_name != name {
            pairs.push((pair_name, pair_value));
        } else if !replaced {
            pairs.push((pair_name, value.to_string()));
            replaced = true;
        }
    }
    if !replaced {
        pairs.push((name.to_string(), value.to_string()));
    }

    url.url_mut()
        .query_pairs_mut()
        .clear()
        .extend_pairs(&pairs);
    Ok(url.into_string())
}
