use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rocket::{
    fairing::{Fairing, Info, Kind},
    http::StatusClass,
    request::{FromRequest, Outcome},
    Data, Orbit, Request, Response, Rocket,
};

/// Sequence number tying a request's log lines together.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct RequestId(pub usize);

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl RequestId {
    fn next() -> RequestId {
        static ISSUED: AtomicUsize = AtomicUsize::new(0);
        RequestId(ISSUED.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-request bookkeeping, created on first use and cached on the request.
#[derive(Debug)]
pub struct RequestTrace {
    pub id: RequestId,
    arrived: Instant,
}

impl RequestTrace {
    pub fn of<'r>(req: &'r Request<'_>) -> &'r RequestTrace {
        req.local_cache(|| RequestTrace {
            id: RequestId::next(),
            arrived: Instant::now(),
        })
    }

    pub fn elapsed(&self) -> Duration {
        self.arrived.elapsed()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for &'r RequestId {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(&RequestTrace::of(req).id)
    }
}

/// `name (uri)` of the matched route.
fn route_label(req: &Request<'_>) -> String {
    match req.route() {
        Some(route) => match route.name {
            Some(ref name) => format!("{name} ({})", route.uri),
            None => route.uri.to_string(),
        },
        None => "no route".to_string(),
    }
}

/// Logs one line per request and one per response, plus launch and shutdown.
#[derive(Debug, Copy, Clone)]
pub struct LoggerFairing;

#[rocket::async_trait]
impl Fairing for LoggerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Logger",
            kind: Kind::Liftoff | Kind::Request | Kind::Response | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let config = rocket.config();
        let scheme = if config.tls_enabled() { "https" } else { "http" };
        info!(
            "Listening on {scheme}://{}:{} with {} routes",
            config.address,
            config.port,
            rocket.routes().count()
        );
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        let trace = RequestTrace::of(req);
        info!("->req{} {} {}", trace.id, req.method(), req.uri());
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        let trace = RequestTrace::of(req);
        let status = res.status();
        let line = format!(
            "<-rsp{} {status} {} in {}ms",
            trace.id,
            route_label(req),
            trace.elapsed().as_millis()
        );
        match status.class() {
            StatusClass::ServerError => error!("{line}"),
            StatusClass::ClientError => warn!("{line}"),
            _ => info!("{line}"),
        }
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        warn!("Shutting down");
    }
}

#[cfg(test)]
mod tests {
    use rocket::local::asynchronous::Client;

    use super::*;
    use crate::testing::init_logging;

    #[get("/id")]
    fn echo_id(id: &RequestId) -> String {
        id.to_string()
    }

    #[rocket::async_test]
    async fn each_request_gets_its_own_id() {
        init_logging();
        let rocket = rocket::custom(rocket::figment::Figment::from(rocket::Config::default()))
            .mount("/", routes![echo_id])
            .attach(LoggerFairing);
        let client = Client::tracked(rocket).await.unwrap();

        let mut ids = Vec::new();
        for _ in 0..2 {
            let body = client.get("/id").dispatch().await.into_string().await;
            ids.push(body.unwrap().parse::<usize>().unwrap());
        }
        assert!(ids[1] > ids[0]);
    }
}
