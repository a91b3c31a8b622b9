use crate::client::{NetworkClient, StartOptions};
use crate::error::Error;
use crate::readiness::{ReadinessPoller, WaitOutcome};
use crate::report;
use crate::tags::TagSet;
use std::io::Write;
use std::time::Duration;
use tracing::{info, warn};

/// Join the network, wait for the backend, and write the peers passing
/// `filter` to `out`. Returns how many peers were written.
///
/// A backend that is already logged in is used as is: no prefs are changed
/// and it is never logged out. Otherwise the node is started, and if this run
/// logged it in with an auth key and `options.ephemeral` is set, it is logged
/// out again whether or not the rest of the run succeeds.
///
/// Every LocalAPI call before the readiness wait, and the final logout, gives
/// way to a shutdown signal.
pub async fn run<C, W>(
    client: &C,
    options: &StartOptions,
    poller: &ReadinessPoller,
    filter: &TagSet,
    out: &mut W,
) -> Result<usize, Error>
where
    C: NetworkClient + ?Sized,
    W: Write,
{
    let logged_in_here = join(client, options, poller).await?;

    let result = list_when_ready(client, poller, filter, out).await;

    if logged_in_here && options.ephemeral {
        match poller.unless_shutdown(client.logout()).await {
            Some(Ok(())) => info!("Ephemeral node logged out"),
            Some(Err(e)) => warn!("Failed to log out ephemeral node: {}", e),
            None => warn!("Interrupted before the ephemeral node was logged out"),
        }
    }

    result
}

/// Start the node unless the backend already holds a login. Returns whether
/// this run logged the node in with an auth key.
async fn join<C>(client: &C, options: &StartOptions, poller: &ReadinessPoller) -> Result<bool, Error>
where
    C: NetworkClient + ?Sized,
{
    let current = poller
        .unless_shutdown(client.status())
        .await
        .ok_or(Error::Cancelled)?
        .map_err(Error::Status)?;

    if current.backend_state.is_logged_in() {
        info!(state = %current.backend_state, "Backend already logged in, leaving its settings alone");
        return Ok(false);
    }

    poller
        .unless_shutdown(client.start(options))
        .await
        .ok_or(Error::Cancelled)?
        .map_err(Error::Start)?;
    info!(hostname = %options.hostname, "Node started");

    Ok(options.auth_key.is_some())
}

async fn list_when_ready<C, W>(
    client: &C,
    poller: &ReadinessPoller,
    filter: &TagSet,
    out: &mut W,
) -> Result<usize, Error>
where
    C: NetworkClient + ?Sized,
    W: Write,
{
    let snapshot = match poller.wait_until_running(|| client.status()).await {
        Ok(WaitOutcome::Ready(snapshot)) => snapshot,
        Ok(WaitOutcome::Cancelled) => return Err(Error::Cancelled),
        Ok(WaitOutcome::DeadlineExceeded) => {
            return Err(Error::DeadlineExceeded(poller.timeout().unwrap_or(Duration::ZERO)))
        }
        Err(e) => return Err(Error::Status(e)),
    };

    let online = snapshot.peers.values().filter(|peer| peer.online).count();
    info!(peers = snapshot.peers.len(), online, filter = %filter, "Found peers");

    let selected = report::select_peers(&snapshot, filter);
    report::write_peers(out, &selected)?;

    info!(matched = selected.len(), "Listed peers");
    Ok(selected.len())
}
