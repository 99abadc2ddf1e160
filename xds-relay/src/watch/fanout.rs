//! Delivery of one payload to many watches.

use std::sync::Arc;

use bytes::Bytes;

use crate::envelope::Response;
use crate::error::Result;
use crate::message::ResourceAny;
use crate::watch::Watch;

/// Outcome of offering a response to one watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The slot was free and now holds the response.
    Sent,
    /// A stale buffered response was discarded in favour of this one.
    Replaced,
    /// The slot was refilled by another producer between the discard and
    /// the resend; the watch already holds a newer response.
    Skipped,
}

/// Offer `response` to `watch`, replacing a stale buffered response.
///
/// Never blocks. Errors are those of [`Watch::send`].
pub fn deliver(watch: &dyn Watch, response: &dyn Response) -> Result<Delivery> {
    if watch.send(response)? {
        return Ok(Delivery::Sent);
    }

    let replaced = watch.drop_redundant();
    if !watch.send(response)? {
        return Ok(Delivery::Skipped);
    }

    Ok(if replaced {
        Delivery::Replaced
    } else {
        Delivery::Sent
    })
}

/// Per-call counts reported by [`fanout`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutSummary {
    /// Watches whose slot was free.
    pub delivered: usize,
    /// Watches whose stale response was replaced.
    pub replaced: usize,
    /// Watches that were already closed or already held a newer response.
    pub skipped: usize,
    /// Watches closed because delivery failed.
    pub closed: usize,
}

/// Deliver one upstream payload to every watch.
///
/// Each watch gets a response built from its own request, so watches of
/// both API generations can share one payload. A watch that rejects its
/// response is closed, which ends its downstream stream.
pub fn fanout<'a, I>(
    watches: I,
    version: &str,
    resources: &[ResourceAny],
    marshaled_resources: &[Bytes],
) -> FanoutSummary
where
    I: IntoIterator<Item = &'a Arc<dyn Watch>>,
{
    let mut summary = FanoutSummary::default();

    for watch in watches {
        if watch.is_closed() {
            summary.skipped += 1;
            continue;
        }

        let response = watch.request().create_response(
            version.to_string(),
            resources.to_vec(),
            marshaled_resources.to_vec(),
        );

        match deliver(watch.as_ref(), response.as_ref()) {
            Ok(Delivery::Sent) => summary.delivered += 1,
            Ok(Delivery::Replaced) => summary.replaced += 1,
            Ok(Delivery::Skipped) => summary.skipped += 1,
            Err(error) => {
                tracing::warn!(%error, ?watch, "closing watch after failed delivery");
                watch.close();
                summary.closed += 1;
            }
        }
    }

    tracing::trace!(
        version,
        delivered = summary.delivered,
        replaced = summary.replaced,
        skipped = summary.skipped,
        closed = summary.closed,
        "fanout complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{Payload, Request, RequestV2, RequestV3};
    use crate::message::DiscoveryRequest;
    use crate::resource::{v2, v3};
    use crate::watch::{WatchV2, WatchV3};

    fn watch_v2() -> Arc<WatchV2> {
        Arc::new(WatchV2::new(Arc::new(RequestV2::new(
            DiscoveryRequest::new(v2::CLUSTER),
        ))))
    }

    fn watch_v3() -> Arc<WatchV3> {
        Arc::new(WatchV3::new(Arc::new(RequestV3::new(
            DiscoveryRequest::new(v3::CLUSTER),
        ))))
    }

    /// A `Response` implemented outside the envelope module.
    #[derive(Debug)]
    struct ForeignResponse(Box<dyn Response>);

    impl Response for ForeignResponse {
        fn payload(&self) -> Payload<'_> {
            self.0.payload()
        }
    }

    #[test]
    fn test_deliver_replaces_stale_response() {
        let watch = watch_v2();
        let request = Arc::clone(watch.versioned_request());

        let first = Arc::clone(&request).create_response("1".into(), vec![], vec![]);
        let second = request.create_response("2".into(), vec![], vec![]);

        assert_eq!(deliver(watch.as_ref(), first.as_ref()).unwrap(), Delivery::Sent);
        assert_eq!(
            deliver(watch.as_ref(), second.as_ref()).unwrap(),
            Delivery::Replaced
        );

        let rx = watch.channel();
        assert_eq!(rx.try_recv().unwrap().version(), "2");
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn test_deliver_propagates_mismatch() {
        let watch = watch_v2();
        let foreign = ForeignResponse(Arc::new(RequestV3::new(DiscoveryRequest::new(
            v3::CLUSTER,
        )))
        .create_response("1".into(), vec![], vec![]));

        assert!(deliver(watch.as_ref(), &foreign).is_err());
        assert!(watch.channel().try_recv().is_none());
    }

    #[test]
    fn test_fanout_mixed_versions() {
        let a = watch_v2();
        let b = watch_v3();
        let c = watch_v3();
        let watches: Vec<Arc<dyn Watch>> = vec![a.clone(), b.clone(), c.clone()];

        let resources = vec![ResourceAny {
            type_url: v3::CLUSTER.to_string(),
            value: Bytes::from_static(b"cluster"),
        }];

        let summary = fanout(&watches, "1", &resources, &[]);
        assert_eq!(
            summary,
            FanoutSummary {
                delivered: 3,
                ..Default::default()
            }
        );

        // Only `a` drains; `b` and `c` still hold version 1.
        assert_eq!(a.channel().try_recv().unwrap().version(), "1");

        let summary = fanout(&watches, "2", &resources, &[]);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.replaced, 2);

        for rx in [b.channel(), c.channel()] {
            let response = rx.try_recv().unwrap();
            assert_eq!(response.version(), "2");
            assert_eq!(response.resources(), resources.as_slice());
            assert!(rx.try_recv().is_none());
        }
    }

    #[test]
    fn test_fanout_skips_closed_watches() {
        let open = watch_v3();
        let closed = watch_v3();
        closed.close();
        let watches: Vec<Arc<dyn Watch>> = vec![open.clone(), closed.clone()];

        let summary = fanout(&watches, "1", &[], &[]);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.closed, 0);
    }

    #[test]
    fn test_fanout_to_no_watches() {
        let watches: Vec<Arc<dyn Watch>> = Vec::new();
        assert_eq!(fanout(&watches, "1", &[], &[]), FanoutSummary::default());
    }
}
