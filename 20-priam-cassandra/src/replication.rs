//! Region-aware relay policy for replicated writes.
//!
//! A Put is sent to every known peer. A peer that receives the write from a
//! different region relays it once to the peers of its own region; a write
//! that arrives from the same region goes no further. Every write therefore
//! travels at most two hops from the node that accepted it.

use crate::{
    directory::{Peer, PeerDirectory},
    identity::NodeName,
    message::Message,
};

/// Works out which known peer sent `message`. A carried name only counts
/// when the directory holds it under the same mailbox the message replies to;
/// without a name the directory is scanned for the reply mailbox. Senders the
/// directory does not know are `None`.
pub fn sender_of(message: &Message, directory: &PeerDirectory) -> Option<NodeName> {
    let mailbox = message.reply_to.as_ref()?;
    match message.from.as_deref() {
        Some(name) => directory
            .get(name)
            .filter(|peer| &peer.mailbox == mailbox)
            .map(|peer| peer.name.clone()),
        None => directory.name_of(mailbox).cloned(),
    }
}

/// Peers that must receive a relayed copy of a write `local` received from
/// `sender`. Empty unless both regions are known and differ.
pub fn relay_targets<'a>(
    local: &NodeName,
    sender: &NodeName,
    directory: &'a PeerDirectory,
) -> Vec<&'a Peer> {
    let (Some(local_region), Some(sender_region)) = (local.region(), sender.region()) else {
        return Vec::new();
    };
    if local_region == sender_region {
        return Vec::new();
    }
    directory.in_region(local_region).collect()
}
