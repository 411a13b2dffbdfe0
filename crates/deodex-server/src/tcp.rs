use std::io::{self, BufReader};
use std::net::TcpListener;

use tracing::info;

use deodex_hierarchy::{ClassUniverse, IntrinsicTable};

use crate::session::serve;

/// Accepts exactly one connection on an already-bound listener and
/// serves it until the client closes its side. There is no second
/// accept; the process is done once the session ends.
///
/// The listener is bound by the caller so the (slow) hierarchy load can
/// happen between bind and accept without the client's connect racing
/// the socket setup.
pub fn serve_connection(
    listener: &TcpListener,
    universe: &mut ClassUniverse,
    intrinsics: &IntrinsicTable,
) -> io::Result<()> {
    let (stream, peer) = listener.accept()?;
    info!(%peer, "client connected");
    let reader = BufReader::new(stream.try_clone()?);
    serve(reader, &stream, universe, intrinsics)?;
    info!(%peer, "client disconnected");
    Ok(())
}
