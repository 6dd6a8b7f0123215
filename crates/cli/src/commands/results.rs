use crate::output;
use ripple_config::RuntimeConfig;
use ripple_task::load_last_results;

/// Print the last recorded run
pub fn show(config: &RuntimeConfig, json: bool) -> eyre::Result<i32> {
    let Some(path) = config.last_results_path() else {
        println!("writes are disabled; no results are recorded");
        return Ok(0);
    };
    let Some(summary) = load_last_results(&path)? else {
        println!("no recorded run");
        return Ok(0);
    };

    if json {
        output::print_json(&summary)?;
        return Ok(0);
    }
    println!("{} at {}", summary.label, summary.timestamp.to_rfc3339());
    for result in &summary.results {
        println!("{}", output::progress_line(result));
    }
    println!("{}", output::summary_text(&summary));
    Ok(0)
}
