//! fp-client - headless feed player
//!
//! Fetches the feed, lays cards out on a virtual scroll axis and drives the
//! playback scheduler from line commands on stdin:
//!
//! ```text
//! play <n>   pause   resume   next   prev   seek <secs>
//! tap <n>    like <n>   scroll <px>   sort <ordering>   filter [text]
//! end   stop   logout   quit
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fp_client::{
    CardBounds, Feed, FeedApi, HttpFeedApi, Scheduler, SchedulerConfig, SchedulerHandle, Session,
    SimulatedFactory, Viewport, ViewportObserver,
};
use fp_common::{FeedOrdering, TrackId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CARD_HEIGHT: f64 = 600.0;
const VIEWPORT_HEIGHT: f64 = 800.0;

/// Command-line arguments for fp-client
#[derive(Parser, Debug)]
#[command(name = "fp-client")]
#[command(about = "Headless feed player for fp-server")]
#[command(version)]
struct Args {
    /// Base URL of fp-server
    #[arg(short, long, default_value = "http://127.0.0.1:5780", env = "FP_SERVER")]
    server: String,

    /// Bearer token issued at login; anonymous when absent
    #[arg(short, long, env = "FP_TOKEN")]
    token: Option<String>,

    /// Feed ordering: alphabetical or engagement
    #[arg(long, default_value = "alphabetical")]
    sort: String,

    /// TOML file with scheduler tuning
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fp_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    info!("Starting fp-client v{} against {}", env!("CARGO_PKG_VERSION"), args.server);

    let config = match &args.config {
        Some(path) => SchedulerConfig::load(path).context("Failed to load scheduler config")?,
        None => SchedulerConfig::default(),
    };
    let ordering: FeedOrdering = args.sort.parse().context("Invalid --sort value")?;

    let session = Arc::new(match args.token {
        Some(token) => Session::new(token),
        None => Session::anonymous(),
    });
    let api = Arc::new(HttpFeedApi::new(&args.server, session.clone())?);

    let tracks = api
        .list_feed(ordering)
        .await
        .context("Failed to fetch feed")?;
    info!(count = tracks.len(), %ordering, "Feed loaded");
    // `all` is the fetched feed, `feed` the filtered view being played
    let mut all = Feed::new(tracks, ordering);
    let mut query = String::new();
    let mut feed = all.clone();

    let factory = SimulatedFactory::new();
    let (scheduler, task) = Scheduler::spawn(
        config.clone(),
        feed.clone(),
        api.clone(),
        Box::new(factory),
    );

    let viewport = Viewport {
        top: 0.0,
        height: VIEWPORT_HEIGHT,
    };
    let mut observer = ViewportObserver::new(config.threshold, viewport, scheduler.sender())?;
    layout(&mut observer, &Feed::default(), &feed).await;

    tokio::spawn(print_snapshots(scheduler.clone(), all.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };
        let arg = parts.next();

        let result = match (command, arg) {
            ("play", Some(n)) => match track_at(&feed, n) {
                Some(id) => scheduler.play(id).await,
                None => Ok(()),
            },
            ("tap", Some(n)) => match track_at(&feed, n) {
                Some(id) => scheduler.double_tap(id).await,
                None => Ok(()),
            },
            ("like", Some(n)) => {
                if let Some(id) = track_at(&feed, n) {
                    match api.toggle_like(id).await {
                        Ok(action) => println!("{:?}", action),
                        Err(e) => warn!("Like failed: {}", e),
                    }
                }
                Ok(())
            }
            ("pause", _) => scheduler.pause().await,
            ("resume", _) => scheduler.resume().await,
            ("next", _) => scheduler.next().await,
            ("prev", _) => scheduler.prev().await,
            ("stop", _) => scheduler.stop().await,
            ("seek", Some(secs)) => match secs.parse::<f64>() {
                Ok(offset) => scheduler.seek(offset).await,
                Err(_) => {
                    println!("seek expects seconds");
                    Ok(())
                }
            },
            ("scroll", Some(px)) => {
                match px.parse::<f64>() {
                    Ok(top) => {
                        observer.scroll_to(top).await;
                    }
                    Err(_) => println!("scroll expects pixels"),
                }
                Ok(())
            }
            ("sort", Some(order)) => match order.parse::<FeedOrdering>() {
                Ok(ordering) => {
                    all.reorder(ordering);
                    let view = all.filter(&query);
                    layout(&mut observer, &feed, &view).await;
                    feed = view;
                    scheduler.set_feed(feed.clone()).await
                }
                Err(e) => {
                    println!("{}", e);
                    Ok(())
                }
            },
            ("filter", _) => {
                query = line.trim_start().trim_start_matches("filter").trim().to_string();
                let view = all.filter(&query);
                println!("{} of {} tracks match {:?}", view.len(), all.len(), query);
                layout(&mut observer, &feed, &view).await;
                feed = view;
                scheduler.set_feed(feed.clone()).await
            }
            ("end", _) => match scheduler.snapshot().state.current() {
                Some(id) => scheduler.ended(id).await,
                None => Ok(()),
            },
            ("logout", _) => {
                session.logout();
                Ok(())
            }
            ("quit", _) | ("exit", _) => break,
            _ => {
                println!("unknown command: {}", line.trim());
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Command failed: {}", e);
            break;
        }
    }

    scheduler.shutdown().await.ok();
    task.await.context("Scheduler task failed")?;
    Ok(())
}

/// Stack the cards of `next` vertically and stop watching cards it dropped
async fn layout(observer: &mut ViewportObserver, previous: &Feed, next: &Feed) {
    for track in previous.tracks() {
        if !next.contains(track.id) {
            observer.unobserve(track.id).await;
        }
    }
    for (index, track) in next.tracks().iter().enumerate() {
        let bounds = CardBounds {
            top: index as f64 * CARD_HEIGHT,
            height: CARD_HEIGHT,
        };
        observer.observe(track.id, bounds).await;
    }
}

fn track_at(feed: &Feed, index: &str) -> Option<TrackId> {
    let id = index
        .parse::<usize>()
        .ok()
        .and_then(|i| feed.get(i))
        .map(|t| t.id);
    if id.is_none() {
        println!("no track at index {}", index);
    }
    id
}

async fn print_snapshots(scheduler: SchedulerHandle, feed: Feed) {
    let mut rx = scheduler.subscribe();
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        let title = snapshot
            .state
            .current()
            .and_then(|id| feed.index_of(id).and_then(|i| feed.get(i)))
            .map(|t| t.title.clone())
            .unwrap_or_else(|| "-".to_string());
        println!("[{:?}] {} (epoch {})", snapshot.state, title, snapshot.epoch);
    }
}
