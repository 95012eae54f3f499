//! `builderhub watch`: follow a live collection until interrupted.

use std::sync::Arc;

use anyhow::Result;
use builderhub::builderhub_common::time::{format_relative, now_millis};
use builderhub::builderhub_common::{Entity, Project, Task};
use builderhub::config::{HubConfig, RealtimeMode};
use builderhub::realtime::{
    Collection, CollectionQuery, DisabledRealtime, LiveCollection, LiveState, PollingRealtime,
    RealtimeSource,
};
use builderhub::session::RequestContext;
use console::style;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::tasks::status_label;
use super::{Client, spinner};

pub async fn cmd_watch(config: &HubConfig, collection: &str, project: Option<&str>) -> Result<()> {
    let collection: Collection = collection.parse().map_err(anyhow::Error::msg)?;
    let client = Client::connect(config)?;
    let ctx = client.context()?;

    let source: Box<dyn RealtimeSource> = match config.realtime.mode {
        RealtimeMode::Polling => Box::new(PollingRealtime::new(
            Arc::clone(&client.gateway),
            ctx.child(),
            config.poll_interval(),
        )),
        RealtimeMode::Off => Box::new(DisabledRealtime),
    };

    match collection {
        Collection::Projects => {
            follow::<Project>(&client, source.as_ref(), &ctx, CollectionQuery::projects(), config, |p| {
                format!("{}  {}", style(&p.id).dim(), style(&p.name).bold())
            })
            .await
        }
        Collection::Tasks => {
            follow::<Task>(&client, source.as_ref(), &ctx, CollectionQuery::tasks(project), config, |t| {
                task_line(t, now_millis())
            })
            .await
        }
        Collection::Users => anyhow::bail!("Watching users is not supported; use projects or tasks"),
    }
}

/// One row of the task listing, with its age measured from `now`.
fn task_line(task: &Task, now: i64) -> String {
    format!(
        "{}  [{}]  {}  {}",
        style(&task.id).dim(),
        status_label(task.status),
        task.title,
        style(format_relative(task.updated_at, now)).dim()
    )
}

async fn follow<T>(
    client: &Client,
    source: &dyn RealtimeSource,
    ctx: &RequestContext,
    query: CollectionQuery,
    config: &HubConfig,
    render: impl Fn(&T) -> String,
) -> Result<()>
where
    T: Entity + Clone + Serialize + DeserializeOwned,
{
    let pb = spinner(&format!("Subscribing to {}...", query.collection));
    let mut live = LiveCollection::<T>::open(
        source,
        client.gateway.as_ref(),
        ctx,
        query,
        config.realtime.reconcile,
    )
    .await;
    live.ready().await;
    pb.finish_and_clear();

    print_snapshot(&live, &render);
    if live.state() == LiveState::FellBack {
        println!(
            "{}",
            style("Live updates unavailable; showing a one-time snapshot.").yellow()
        );
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = live.next_change() => {
                if !changed {
                    break;
                }
                print_snapshot(&live, &render);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }
    live.unsubscribe();
    ctx.cancel.cancel();
    Ok(())
}

fn print_snapshot<T>(live: &LiveCollection<T>, render: &impl Fn(&T) -> String)
where
    T: Entity + Clone + Serialize + DeserializeOwned,
{
    println!();
    println!(
        "{} {} ({})",
        style("──").dim(),
        style(live.query().collection).bold(),
        live.data().len()
    );
    if let Some(err) = live.error() {
        eprintln!("{} {}", style("error:").red().bold(), err);
    }
    for item in live.data() {
        println!("{}", render(item));
    }
}
