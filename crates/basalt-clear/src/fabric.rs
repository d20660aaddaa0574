//! In-process distribution between simulated members.
//!
//! A [`LoopbackFabric`] connects the members of one simulated cluster. Each
//! member talks to it through its own [`LoopbackChannel`]. Messages are
//! encoded, handed to the recipient's [`ClearMessageHandler`] on a fresh
//! thread, and the encoded reply is fed back to the sender's collector.
//! Recipients that leave the [`MembershipView`] before replying are
//! reported as departed.

use crate::distribution::{ClearMessageHandler, DistributionChannel, ReplyCollector};
use crate::error::Result;
use crate::message::{ClearMessage, ClearReply};
use basalt_membership::{MemberIdentity, MembershipListener, MembershipView};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{debug, warn};

type Handlers = RwLock<HashMap<MemberIdentity, Weak<dyn ClearMessageHandler>>>;

#[derive(Default)]
struct InFlight {
    collectors: Mutex<Vec<Weak<ReplyCollector>>>,
}

impl InFlight {
    fn track(&self, collector: &Arc<ReplyCollector>) {
        let mut collectors = self.collectors.lock();
        collectors.retain(|c| c.strong_count() > 0);
        collectors.push(Arc::downgrade(collector));
    }
}

impl MembershipListener for InFlight {
    fn member_departed(&self, member: &MemberIdentity, _crashed: bool) {
        let live: Vec<_> = self.collectors.lock().iter().filter_map(Weak::upgrade).collect();
        for collector in live {
            collector.member_departed(member);
        }
    }
}

struct FabricInner {
    view: Arc<MembershipView>,
    handlers: Handlers,
    in_flight: Arc<InFlight>,
    shut_down: AtomicBool,
}

/// The message fabric of one simulated cluster.
#[derive(Clone)]
pub struct LoopbackFabric {
    inner: Arc<FabricInner>,
}

impl LoopbackFabric {
    pub fn new(view: Arc<MembershipView>) -> Self {
        let in_flight = Arc::new(InFlight::default());
        view.add_listener(in_flight.clone());
        LoopbackFabric {
            inner: Arc::new(FabricInner {
                view,
                handlers: RwLock::new(HashMap::new()),
                in_flight,
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn view(&self) -> &Arc<MembershipView> {
        &self.inner.view
    }

    /// The channel `member` uses to reach the others.
    pub fn channel(&self, member: MemberIdentity) -> LoopbackChannel {
        LoopbackChannel {
            fabric: self.clone(),
            member,
        }
    }

    /// Route messages for `member` to `handler`. The fabric does not keep
    /// the handler alive.
    pub fn register(&self, member: MemberIdentity, handler: Weak<dyn ClearMessageHandler>) {
        self.inner.handlers.write().insert(member, handler);
    }

    pub fn unregister(&self, member: &MemberIdentity) {
        self.inner.handlers.write().remove(member);
    }

    /// Refuse further sends on every channel.
    pub fn shut_down(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
    }

    fn handler(&self, member: &MemberIdentity) -> Option<Arc<dyn ClearMessageHandler>> {
        self.inner.handlers.read().get(member).and_then(Weak::upgrade)
    }

    fn deliver(&self, message: &ClearMessage, recipients: &[MemberIdentity]) -> Result<Arc<ReplyCollector>> {
        let bytes = Arc::new(message.encode()?);
        let collector = Arc::new(ReplyCollector::new(recipients.iter().cloned()));
        self.inner.in_flight.track(&collector);

        for recipient in recipients {
            let handler = match self.handler(recipient) {
                Some(handler) if self.inner.view.is_current_member(recipient) => handler,
                _ => {
                    debug!(to = %recipient, "recipient unreachable");
                    collector.member_departed(recipient);
                    continue;
                }
            };
            let bytes = bytes.clone();
            let collector_for_thread = collector.clone();
            let spawned = thread::Builder::new()
                .name(format!("clear-msg-{}", recipient.membership_port()))
                .spawn(move || process_remote(handler.as_ref(), &bytes, &collector_for_thread));
            if let Err(err) = spawned {
                warn!(to = %recipient, %err, "could not start message processing");
                collector.member_departed(recipient);
            }
        }
        Ok(collector)
    }
}

fn process_remote(handler: &dyn ClearMessageHandler, bytes: &[u8], collector: &ReplyCollector) {
    let reply = match ClearMessage::decode(bytes) {
        Ok(message) => handler.process(&message),
        Err(err) => {
            warn!(%err, "dropping undecodable clear message");
            return;
        }
    };
    match reply.encode().and_then(|encoded| ClearReply::decode(&encoded)) {
        Ok(reply) => collector.reply(reply),
        Err(err) => warn!(%err, "dropping undecodable clear reply"),
    }
}

/// One member's endpoint on a [`LoopbackFabric`].
#[derive(Clone)]
pub struct LoopbackChannel {
    fabric: LoopbackFabric,
    member: MemberIdentity,
}

impl DistributionChannel for LoopbackChannel {
    fn local_member(&self) -> &MemberIdentity {
        &self.member
    }

    fn is_current_member(&self, member: &MemberIdentity) -> bool {
        self.fabric.inner.view.is_current_member(member)
    }

    fn add_membership_listener(&self, listener: Arc<dyn MembershipListener>) {
        self.fabric.inner.view.add_listener(listener);
    }

    fn put_outgoing(&self, message: ClearMessage, recipients: &[MemberIdentity]) -> Result<Arc<ReplyCollector>> {
        self.fabric.deliver(&message, recipients)
    }

    fn is_cancelled(&self) -> bool {
        self.fabric.inner.shut_down.load(Ordering::Acquire)
            || !self.fabric.inner.view.is_current_member(&self.member)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RegionEvent;
    use crate::message::OperationType;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;

    fn member(port: u16) -> MemberIdentity {
        MemberIdentity::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    struct Echo {
        me: MemberIdentity,
    }

    impl ClearMessageHandler for Echo {
        fn process(&self, message: &ClearMessage) -> ClearReply {
            ClearReply::ok(message, self.me.clone(), vec![self.me.membership_port() as u32])
        }
    }

    /// Leaves the view instead of replying.
    struct Leaver {
        me: MemberIdentity,
        view: Arc<MembershipView>,
    }

    impl ClearMessageHandler for Leaver {
        fn process(&self, message: &ClearMessage) -> ClearReply {
            self.view.depart(&self.me, true);
            ClearReply::ok(message, self.me.clone(), Vec::new())
        }
    }

    fn message() -> ClearMessage {
        ClearMessage::new(member(1), OperationType::PrClear, &RegionEvent::clear("r", member(1)))
    }

    #[test]
    fn test_round_trip_to_registered_members() {
        let view = Arc::new(MembershipView::with_members([member(1), member(2), member(3)]));
        let fabric = LoopbackFabric::new(view);
        let two: Arc<dyn ClearMessageHandler> = Arc::new(Echo { me: member(2) });
        let three: Arc<dyn ClearMessageHandler> = Arc::new(Echo { me: member(3) });
        fabric.register(member(2), Arc::downgrade(&two));
        fabric.register(member(3), Arc::downgrade(&three));

        let channel = fabric.channel(member(1));
        let collector = channel.put_outgoing(message(), &[member(2), member(3)]).unwrap();
        let outcome = collector.wait(Duration::from_secs(5)).unwrap();

        assert!(outcome.is_complete());
        let mut cleared: Vec<u32> = outcome.replies.iter().flat_map(|r| r.cleared_buckets.clone()).collect();
        cleared.sort_unstable();
        assert_eq!(cleared, vec![2, 3]);
    }

    #[test]
    fn test_unregistered_or_absent_member_counts_as_departed() {
        let view = Arc::new(MembershipView::with_members([member(1), member(2)]));
        let fabric = LoopbackFabric::new(view);
        let channel = fabric.channel(member(1));

        let outcome = channel
            .put_outgoing(message(), &[member(2), member(4)])
            .unwrap()
            .wait(Duration::from_secs(1))
            .unwrap();
        assert_eq!(outcome.departed.len(), 2);
    }

    #[test]
    fn test_departure_before_reply() {
        let view = Arc::new(MembershipView::with_members([member(1), member(2)]));
        let fabric = LoopbackFabric::new(view.clone());
        let leaver: Arc<dyn ClearMessageHandler> = Arc::new(Leaver {
            me: member(2),
            view,
        });
        fabric.register(member(2), Arc::downgrade(&leaver));

        let outcome = fabric
            .channel(member(1))
            .put_outgoing(message(), &[member(2)])
            .unwrap()
            .wait(Duration::from_secs(5))
            .unwrap();
        assert_eq!(outcome.departed, vec![member(2)]);
        assert!(outcome.replies.is_empty());
    }

    #[test]
    fn test_cancelled_after_shutdown_or_departure() {
        let view = Arc::new(MembershipView::with_members([member(1), member(2)]));
        let fabric = LoopbackFabric::new(view.clone());
        assert!(!fabric.channel(member(1)).is_cancelled());

        view.depart(&member(2), false);
        assert!(fabric.channel(member(2)).is_cancelled());

        fabric.shut_down();
        assert!(fabric.channel(member(1)).is_cancelled());
    }
}
