//! dazflow-engine CLI
//!
//! Analyze a Lightning Network snapshot from the command line.
//!
//! # Usage
//!
//! ```bash
//! # DazFlow Index of one node
//! dazflow-engine analyze --input network.json --node 02ab...
//!
//! # Max-flow between two nodes, as JSON
//! dazflow-engine flow --input network.json --source 02ab... --target 03cd... --format json
//!
//! # Whole-network topology metrics
//! dazflow-engine topology --input network.json
//!
//! # Generate a random network for testing
//! dazflow-engine generate --nodes 100 --channels-per-node 6 --output network.json
//! ```

use dazflow_engine::centrality::measures::CentralityAnalyzer;
use dazflow_engine::core::config::AnalysisConfig;
use dazflow_engine::core::network::NetworkData;
use dazflow_engine::core::node::NodeId;
use dazflow_engine::dazflow::{DazFlowIndex, DazFlowRequest};
use dazflow_engine::flow::max_flow::{EdgeUtilization, FlowAnalyzer, FlowResult};
use dazflow_engine::graph::snapshot::GraphSnapshot;
use dazflow_engine::simulation::{generate_random_network, NetworkConfig};
use env_logger::Env;
use log::info;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"dazflow-engine — Lightning Network topology and flow analysis

USAGE:
    dazflow-engine <COMMAND> [OPTIONS]

COMMANDS:
    analyze     DazFlow Index, reliability curve and bottlenecks of a node
    flow        Max-flow, probability curve and bottleneck arcs between two nodes
    liquidity   Liquidity profile and rebalancing recommendations of a node
    centrality  Centrality scores of one node or every node
    hubs        Rank the most hub-like nodes
    hopness     Hop-count reachability from sampled or named sources
    topology    Whole-network structural metrics
    position    Structural positioning of a node
    generate    Generate a random network (for testing)
    help        Show this message

OPTIONS (all analysis commands):
    --input <FILE>      Path to JSON network file ({{"nodes": [...], "channels": [...]}})
    --config <FILE>     JSON analysis config (partial overrides allowed)
    --format <FORMAT>   Output format: text (default) or json
    --verbose           Debug logging (RUST_LOG also respected)

OPTIONS (per command):
    --node <PUBKEY>         analyze, liquidity, centrality, position
    --source <PUBKEY>       flow
    --target <PUBKEY>       flow
    --amount <SATS>         flow: payment amount to test
    --amounts <LIST>        analyze: comma-separated amount ladder
    --targets <LIST>        analyze: comma-separated probe destinations
    --betweenness <F>       analyze: precomputed betweenness in [0, 1]
    --sources <LIST>        hopness: comma-separated source pubkeys
    --sample <N>            hopness: number of sampled sources
    --top <N>               hubs, flow: entries to show (default: 10)

OPTIONS (generate):
    --nodes <N>             Number of nodes (default: 50)
    --channels-per-node <N> Average channels per node (default: 4)
    --seed <N>              RNG seed (default: 42)
    --output <FILE>         Write to file instead of stdout

EXAMPLES:
    dazflow-engine analyze --input network.json --node 02ab... --format json
    dazflow-engine flow --input network.json --source 02ab... --target 03cd... --amount 500000
    dazflow-engine hubs --input network.json --top 5
    dazflow-engine generate --nodes 200 --seed 7 --output network.json"#
    );
}

#[derive(Debug, Default)]
struct Options {
    input: Option<String>,
    config: Option<String>,
    json: bool,
    verbose: bool,
    node: Option<String>,
    source: Option<String>,
    target: Option<String>,
    amount: Option<u64>,
    amounts: Option<Vec<u64>>,
    targets: Option<Vec<String>>,
    betweenness: Option<f64>,
    sources: Option<Vec<String>>,
    sample: Option<usize>,
    top: Option<usize>,
    nodes: Option<usize>,
    channels_per_node: Option<usize>,
    seed: Option<u64>,
    output: Option<String>,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    args.get(i)
        .map(String::as_str)
        .unwrap_or_else(|| fail(format!("{} requires a value", flag)))
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    value(args, i, flag)
        .parse()
        .unwrap_or_else(|_| fail(format!("{} requires a number", flag)))
}

fn list(args: &[String], i: usize, flag: &str) -> Vec<String> {
    value(args, i, flag)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_options(args: &[String]) -> Options {
    let mut opts = Options::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--verbose" | "-v" => opts.verbose = true,
            "--input" => {
                i += 1;
                opts.input = Some(value(args, i, flag).to_string());
            }
            "--config" => {
                i += 1;
                opts.config = Some(value(args, i, flag).to_string());
            }
            "--format" => {
                i += 1;
                opts.json = match value(args, i, flag) {
                    "json" => true,
                    "text" => false,
                    other => fail(format!("--format must be 'text' or 'json', got '{}'", other)),
                };
            }
            "--node" => {
                i += 1;
                opts.node = Some(value(args, i, flag).to_string());
            }
            "--source" => {
                i += 1;
                opts.source = Some(value(args, i, flag).to_string());
            }
            "--target" => {
                i += 1;
                opts.target = Some(value(args, i, flag).to_string());
            }
            "--amount" => {
                i += 1;
                opts.amount = Some(number(args, i, flag));
            }
            "--amounts" => {
                i += 1;
                let amounts = list(args, i, flag)
                    .iter()
                    .map(|s| {
                        s.parse()
                            .unwrap_or_else(|_| fail(format!("invalid amount '{}'", s)))
                    })
                    .collect();
                opts.amounts = Some(amounts);
            }
            "--targets" => {
                i += 1;
                opts.targets = Some(list(args, i, flag));
            }
            "--betweenness" => {
                i += 1;
                opts.betweenness = Some(number(args, i, flag));
            }
            "--sources" => {
                i += 1;
                opts.sources = Some(list(args, i, flag));
            }
            "--sample" => {
                i += 1;
                opts.sample = Some(number(args, i, flag));
            }
            "--top" => {
                i += 1;
                opts.top = Some(number(args, i, flag));
            }
            "--nodes" => {
                i += 1;
                opts.nodes = Some(number(args, i, flag));
            }
            "--channels-per-node" => {
                i += 1;
                opts.channels_per_node = Some(number(args, i, flag));
            }
            "--seed" => {
                i += 1;
                opts.seed = Some(number(args, i, flag));
            }
            "--output" => {
                i += 1;
                opts.output = Some(value(args, i, flag).to_string());
            }
            _ => fail(format!("unknown option: {}", flag)),
        }
        i += 1;
    }
    opts
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn load_config(opts: &Options) -> AnalysisConfig {
    let config = match &opts.config {
        Some(path) => {
            let content = fs::read_to_string(path)
                .unwrap_or_else(|e| fail(format!("reading config '{}': {}", path, e)));
            serde_json::from_str(&content)
                .unwrap_or_else(|e| fail(format!("parsing config '{}': {}", path, e)))
        }
        None => AnalysisConfig::default(),
    };
    if let Err(e) = config.validate() {
        fail(e);
    }
    config
}

fn load_snapshot(opts: &Options, config: &AnalysisConfig) -> GraphSnapshot {
    let path = opts
        .input
        .as_deref()
        .unwrap_or_else(|| fail("--input <FILE> is required"));
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| fail(format!("reading file '{}': {}", path, e)));
    let snapshot = NetworkData::from_json(&content)
        .and_then(|data| data.into_snapshot(config))
        .unwrap_or_else(|e| fail(e));
    info!(
        "loaded {} nodes and {} channels from {}",
        snapshot.node_count(),
        snapshot.channel_count(),
        path
    );
    for diagnostic in snapshot.diagnostics() {
        info!("{}", diagnostic);
    }
    snapshot
}

fn required(value: &Option<String>, flag: &str) -> NodeId {
    value
        .as_deref()
        .map(NodeId::from)
        .unwrap_or_else(|| fail(format!("{} <PUBKEY> is required", flag)))
}

fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| fail(format!("serializing output: {}", e)));
    println!("{}", json);
}

fn cmd_analyze(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let request = DazFlowRequest {
        node_id: required(&opts.node, "--node"),
        targets: opts
            .targets
            .as_ref()
            .map(|ids| ids.iter().map(|id| NodeId::from(id.as_str())).collect()),
        payment_amounts: opts.amounts.clone(),
        historical_success_rate: None,
        betweenness: opts.betweenness,
    };
    let report = DazFlowIndex::analyze(&snapshot, &request, &config).unwrap_or_else(|e| fail(e));

    if opts.json {
        print_json(&report);
        return;
    }
    let a = &report.analysis;
    println!("Node:                 {}", a.node_id);
    println!("Status:               {:?}", report.status);
    println!("DazFlow Index:        {:.4}", a.dazflow_index);
    println!("Liquidity efficiency: {:.4}", a.liquidity_efficiency);
    println!("Network centrality:   {:.4}", a.network_centrality);
    println!("\nReliability curve:");
    let curve = &report.reliability_curve;
    for ((amount, p), ci) in curve
        .amounts
        .iter()
        .zip(&curve.probabilities)
        .zip(&curve.confidence_intervals)
    {
        println!(
            "  {:>12} sats  {:.4}  [{:.4}, {:.4}]",
            amount, p, ci.lower, ci.upper
        );
    }
    if !curve.recommended_amounts.is_empty() {
        println!("  Recommended: {:?}", curve.recommended_amounts);
    }
    if !report.bottlenecks.is_empty() {
        println!("\nBottlenecks:");
        for b in &report.bottlenecks {
            let issues: Vec<String> = b.issues.iter().map(|i| i.to_string()).collect();
            println!(
                "  {} ({})  imbalance {:.2}  {:?}  {}",
                b.channel_id,
                b.peer_alias,
                b.imbalance_ratio,
                b.severity,
                issues.join(", ")
            );
        }
    }
    for d in &report.diagnostics {
        println!("note: {}", d);
    }
}

fn cmd_flow(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let source = required(&opts.source, "--source");
    let target = required(&opts.target, "--target");
    let result =
        FlowAnalyzer::max_flow(&snapshot, &source, &target, opts.amount).unwrap_or_else(|e| fail(e));
    let curve = FlowAnalyzer::payment_probability_curve(
        &snapshot,
        &source,
        &target,
        &config.payment_amounts,
    )
    .unwrap_or_else(|e| fail(e));
    let busiest = FlowAnalyzer::bottleneck_analysis(&result, opts.top.unwrap_or(10));

    if opts.json {
        #[derive(Serialize)]
        struct FlowOutput<'a> {
            result: &'a FlowResult,
            probability_curve: &'a BTreeMap<u64, f64>,
            edge_utilization: &'a [EdgeUtilization],
        }
        print_json(&FlowOutput {
            result: &result,
            probability_curve: &curve,
            edge_utilization: &busiest,
        });
        return;
    }
    println!("Max flow {} → {}: {} sats", source, target, result.max_flow_value);
    println!("Success probability:  {:.4}", result.success_probability);
    println!("Paths: {}", result.flow_paths.len());
    for path in result.flow_paths.iter().take(opts.top.unwrap_or(10)) {
        let hops: Vec<&str> = path.nodes.iter().map(NodeId::as_str).collect();
        println!(
            "  {:>12} sats  {} hops  {}",
            path.amount,
            path.hop_count(),
            hops.join(" → ")
        );
    }
    if !result.bottleneck_edges.is_empty() {
        println!("Min cut:");
        for edge in &result.bottleneck_edges {
            println!("  {} → {}  {} sats", edge.from, edge.to, edge.capacity);
        }
    }
    println!("Probability curve:");
    for (amount, p) in &curve {
        println!("  {:>12} sats  {:.4}", amount, p);
    }
}

fn cmd_liquidity(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let node = required(&opts.node, "--node");
    let profile = FlowAnalyzer::liquidity_profile(&snapshot, &node, config.hub_count)
        .unwrap_or_else(|e| fail(e));
    let recommendations =
        FlowAnalyzer::rebalancing_recommendations(&snapshot, &node).unwrap_or_else(|e| fail(e));

    if opts.json {
        print_json(&serde_json::json!({
            "profile": profile,
            "recommendations": recommendations,
        }));
        return;
    }
    println!("Node:      {}", profile.node);
    println!("Outbound:  {} sats", profile.outbound_liquidity);
    println!("Inbound:   {} sats", profile.inbound_liquidity);
    println!("Ratio:     {:.4}", profile.liquidity_ratio);
    println!(
        "Channels:  {} ({} active)",
        profile.channel_count, profile.active_channel_count
    );
    println!("Hub reach: {:.4}", profile.hub_reachability_score);
    if recommendations.is_empty() {
        println!("No rebalancing needed.");
    }
    for r in &recommendations {
        println!(
            "  [{}] {} ({}): {:?} by {} sats ({:.2} → {:.2})",
            r.priority, r.peer, r.peer_alias, r.direction, r.amount, r.current_ratio, r.target_ratio
        );
    }
}

fn cmd_centrality(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let node = opts.node.as_deref().map(NodeId::from);
    let report =
        CentralityAnalyzer::centrality(&snapshot, node.as_ref(), &config).unwrap_or_else(|e| fail(e));

    if opts.json {
        print_json(&report);
        return;
    }
    println!(
        "{:<20} {:>10} {:>12} {:>10} {:>12}",
        "node", "degree", "betweenness", "closeness", "eigenvector"
    );
    for (id, c) in &report.nodes {
        let short: String = id.as_str().chars().take(20).collect();
        println!(
            "{:<20} {:>10.4} {:>12.4} {:>10.4} {:>12.4}",
            short, c.degree, c.betweenness, c.closeness, c.eigenvector
        );
    }
    if report.approximate {
        println!(
            "(sampled: {} betweenness pivots, {} closeness pivots)",
            report.betweenness_pivots, report.closeness_pivots
        );
    }
    for d in &report.diagnostics {
        println!("note: {}", d);
    }
}

fn cmd_hubs(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let report = CentralityAnalyzer::hubness(&snapshot, opts.top.unwrap_or(10), &config);

    if opts.json {
        print_json(&report);
        return;
    }
    for (rank, hub) in report.hubs.iter().enumerate() {
        println!(
            "{:>3}. {:<24} score {:.4}  degree {:>4}  capacity {} sats",
            rank + 1,
            hub.alias,
            hub.score,
            hub.degree,
            hub.weighted_degree
        );
    }
    println!("Gini coefficient: {:.4}", report.gini_coefficient);
}

fn cmd_hopness(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let sources: Option<Vec<NodeId>> = opts
        .sources
        .as_ref()
        .map(|ids| ids.iter().map(|id| NodeId::from(id.as_str())).collect());
    let report = CentralityAnalyzer::hopness(
        &snapshot,
        sources.as_deref(),
        opts.sample.unwrap_or(config.hopness_sample_size),
        &config,
    )
    .unwrap_or_else(|e| fail(e));

    if opts.json {
        print_json(&report);
        return;
    }
    for s in &report.sources {
        println!(
            "{}  reach {:.4}  avg hops {:.2}  efficiency {:.4}",
            s.source, s.reachability_ratio, s.avg_distance, s.routing_efficiency
        );
    }
    println!(
        "Network: reach {:.4}  avg hops {:.2}  efficiency {:.4}  max eccentricity {}",
        report.network.avg_reachability_ratio,
        report.network.avg_distance,
        report.network.avg_routing_efficiency,
        report.network.max_eccentricity
    );
    if !report.timed_out.is_empty() {
        println!("Timed out: {} sources", report.timed_out.len());
    }
}

fn cmd_topology(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let t = CentralityAnalyzer::topology_metrics(&snapshot);

    if opts.json {
        print_json(&t);
        return;
    }
    println!("Nodes:                 {}", t.node_count);
    println!("Node pairs:            {}", t.edge_count);
    println!("Channels:              {}", t.channel_count);
    println!("Density:               {:.6}", t.density);
    println!("Average degree:        {:.2}", t.avg_degree);
    println!(
        "Components:            {} (giant {:.1}%)",
        t.connected_components,
        t.giant_component_ratio * 100.0
    );
    println!("Diameter / radius:     {} / {}", t.diameter, t.radius);
    println!("Avg shortest path:     {:.3}", t.avg_shortest_path);
    println!("Transitivity:          {:.4}", t.transitivity);
    println!("Avg clustering:        {:.4}", t.avg_clustering);
    println!("Degree assortativity:  {:.4}", t.degree_assortativity);
    println!("Cut edges:             {}", t.cut_edges_count);
    println!("Articulation points:   {}", t.articulation_points_count);
    println!("Robustness:            {:.4}", t.robustness_score);
}

fn cmd_position(opts: &Options) {
    let config = load_config(opts);
    let snapshot = load_snapshot(opts, &config);
    let node = required(&opts.node, "--node");
    let pos =
        CentralityAnalyzer::node_positioning(&snapshot, &node, &config).unwrap_or_else(|e| fail(e));

    if opts.json {
        print_json(&pos);
        return;
    }
    println!("Node:            {} ({})", pos.node, pos.alias);
    println!(
        "Degree:          {} (rank {}, {:.1} percentile)",
        pos.degree,
        pos.degree_rank,
        100.0 * pos.degree_percentile
    );
    println!(
        "Hub connections: {} ({:.2})",
        pos.neighborhood.hub_connections, pos.neighborhood.hub_connection_ratio
    );
    println!("Eccentricity:    {}", pos.eccentricity);
    println!("Strategic score: {:.4}", pos.strategic_score);
}

fn cmd_generate(opts: &Options) {
    let defaults = NetworkConfig::default();
    let config = NetworkConfig {
        node_count: opts.nodes.unwrap_or(defaults.node_count),
        avg_channels_per_node: opts
            .channels_per_node
            .unwrap_or(defaults.avg_channels_per_node),
        seed: opts.seed.unwrap_or(defaults.seed),
        ..defaults
    };
    let data = generate_random_network(&config);
    let json = data.to_json().unwrap_or_else(|e| fail(e));

    if let Some(path) = &opts.output {
        fs::write(path, &json).unwrap_or_else(|e| fail(format!("writing to '{}': {}", path, e)));
        eprintln!(
            "Generated {} channels across {} nodes → {}",
            data.channels.len(),
            data.nodes.len(),
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return;
    }
    let opts = parse_options(&args[2..]);
    init_logging(opts.verbose);

    match command {
        "analyze" => cmd_analyze(&opts),
        "flow" => cmd_flow(&opts),
        "liquidity" => cmd_liquidity(&opts),
        "centrality" => cmd_centrality(&opts),
        "hubs" => cmd_hubs(&opts),
        "hopness" => cmd_hopness(&opts),
        "topology" => cmd_topology(&opts),
        "position" => cmd_position(&opts),
        "generate" => cmd_generate(&opts),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
