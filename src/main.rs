use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};

use abtest_core::abn::{evaluate_abn, Arm, Comparison};
use abtest_core::logging::init_logging;
use abtest_core::planning::{aa_false_positive_rate, estimate_roi, minimum_detectable_effect, required_sample_size};
use abtest_core::sequential::{replay_looks, StopEvent};
use abtest_core::srm::parse_counts;
use abtest_core::{
    infer_metric_type, make_sequential_plan, srm_check, validate_table, AbError, AnalysisConfig, AnalysisResult,
    DataSchema, Dataset, Engine, MetricType, RawTable, SequentialPreset, Sidedness,
};

#[derive(Parser)]
#[command(name = "abtest")]
#[command(version)]
#[command(about = "Statistical analysis of A/B experiments", long_about = None)]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse row-level experiment data from a CSV file
    Analyze {
        #[arg(value_name = "CSV")]
        input: PathBuf,

        #[arg(long, default_value = "group")]
        group_col: String,

        #[arg(long, default_value = "metric")]
        metric_col: String,

        /// Pre-period covariate column for CUPED
        #[arg(long)]
        pre_col: Option<String>,

        #[arg(long)]
        user_col: Option<String>,

        /// JSON analysis config; flags below override it
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// binomial, continuous or ratio (inferred from the data if omitted)
        #[arg(long)]
        metric_type: Option<MetricType>,

        #[arg(long)]
        alpha: Option<f64>,

        /// two, left or right
        #[arg(long)]
        sided: Option<Sidedness>,

        /// Segment columns, comma-separated
        #[arg(long, value_delimiter = ',')]
        segments: Vec<String>,

        #[arg(long)]
        cuped: bool,

        #[arg(long)]
        bayes: bool,

        #[arg(long)]
        robust: bool,

        #[arg(long)]
        bootstrap: bool,

        #[arg(long)]
        fieller: bool,

        #[arg(long)]
        sequential: bool,

        #[arg(long)]
        looks: Option<usize>,

        #[arg(long)]
        preset: Option<SequentialPreset>,

        /// p-values of earlier looks, comma-separated
        #[arg(long, value_delimiter = ',')]
        history: Vec<f64>,

        #[arg(long)]
        seed: Option<u64>,

        /// Run even when the SRM check fails
        #[arg(long)]
        force_srm: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// A/B or A/B/C conversion summary from aggregate counts
    Abn {
        #[arg(long)]
        users_a: u64,
        #[arg(long)]
        conv_a: u64,
        #[arg(long)]
        users_b: u64,
        #[arg(long)]
        conv_b: u64,
        #[arg(long, requires = "conv_c")]
        users_c: Option<u64>,
        #[arg(long, requires = "users_c")]
        conv_c: Option<u64>,

        #[arg(long, default_value = "0.05")]
        alpha: f64,

        /// Number of metrics evaluated simultaneously
        #[arg(long, default_value = "1")]
        metrics: usize,

        /// Replay A vs B as this many interim looks
        #[arg(long)]
        replay_looks: Option<usize>,

        #[arg(long, default_value = "pocock")]
        preset: SequentialPreset,
    },

    /// Sample ratio mismatch check
    Srm {
        /// Group counts, e.g. A=100,B=120
        #[arg(long)]
        counts: String,

        #[arg(long, default_value = "0.001")]
        alpha: f64,
    },

    /// Print a sequential alpha-spending plan
    Plan {
        #[arg(long, default_value = "5")]
        looks: usize,

        #[arg(long, default_value = "0.05")]
        alpha: f64,

        #[arg(long, default_value = "pocock")]
        preset: SequentialPreset,
    },

    /// Users per group needed to detect p1 vs p2
    SampleSize {
        #[arg(long)]
        p1: f64,
        #[arg(long)]
        p2: f64,
        #[arg(long, default_value = "0.05")]
        alpha: f64,
        #[arg(long, default_value = "0.8")]
        power: f64,
    },

    /// Simulate A/A tests and report the false-positive rate
    Aa {
        #[arg(long)]
        baseline: f64,
        #[arg(long)]
        users: u64,
        #[arg(long, default_value = "0.05")]
        alpha: f64,
        #[arg(long, default_value = "1000")]
        sims: usize,
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Project revenue and ROI of a conversion uplift on paid traffic
    Roi {
        #[arg(long)]
        revenue_per_user: f64,
        #[arg(long)]
        cost_per_user: f64,
        #[arg(long)]
        budget: f64,
        #[arg(long)]
        baseline: f64,
        /// Relative uplift, 0.1 = +10%
        #[arg(long)]
        uplift: f64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("Error [{}]: {}", e.code(), e);
        if let Some(hint) = e.fix_hint() {
            eprintln!("  Hint: {}", hint);
        }
        process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), AbError> {
    match command {
        Commands::Analyze {
            input,
            group_col,
            metric_col,
            pre_col,
            user_col,
            config,
            metric_type,
            alpha,
            sided,
            segments,
            cuped,
            bayes,
            robust,
            bootstrap,
            fieller,
            sequential,
            looks,
            preset,
            history,
            seed,
            force_srm,
            json,
        } => {
            let from_file = config.is_some();
            let mut cfg = match &config {
                Some(path) => AnalysisConfig::from_json_file(path)?,
                None => AnalysisConfig::new(0.05, MetricType::Continuous),
            };
            if let Some(a) = alpha {
                cfg.alpha = a;
            }
            if let Some(s) = sided {
                cfg.sided = s;
            }
            if !segments.is_empty() {
                cfg.segments = segments;
            }
            if cuped {
                cfg.use_cuped = true;
            }
            if pre_col.is_some() {
                cfg.preperiod_metric_col = pre_col.clone();
            }
            if bayes {
                cfg.use_bayes = true;
            }
            if robust {
                cfg.robust = true;
            }
            if bootstrap {
                cfg.bootstrap = true;
            }
            if fieller {
                cfg.use_fieller = true;
            }
            if sequential {
                cfg.use_sequential = true;
            }
            if let Some(k) = looks {
                cfg.sequential_looks = k;
            }
            if let Some(p) = preset {
                cfg.sequential_preset = p;
            }
            if !history.is_empty() {
                cfg.sequential_history_p = history;
            }
            if let Some(s) = seed {
                cfg.seed = s;
            }
            if force_srm {
                cfg.force_run_when_srm_failed = true;
            }

            let mut schema = DataSchema::new(&group_col, &metric_col);
            if let Some(p) = cfg.preperiod_metric_col.as_deref() {
                schema = schema.with_preperiod(p);
            }
            if let Some(u) = user_col.as_deref() {
                schema = schema.with_user_id(u);
            }

            let table = RawTable::from_path(&input)?;
            let data = validate_table(&table, &schema, cfg.nan_policy, &cfg.segments)?;
            match metric_type {
                Some(m) => cfg.metric_type = m,
                None if !from_file => cfg.metric_type = infer_metric_type(&data),
                None => {}
            }

            let engine = Engine::new().with_notifier(Box::new(|e: &StopEvent| println!(">> {}", e.message())));
            let result = engine.analyze(&data, &cfg)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_analysis(&input, &data, &cfg, &result);
            }
        }

        Commands::Abn {
            users_a,
            conv_a,
            users_b,
            conv_b,
            users_c,
            conv_c,
            alpha,
            metrics,
            replay_looks: looks,
            preset,
        } => {
            let mut arms = vec![Arm::new(users_a, conv_a), Arm::new(users_b, conv_b)];
            if let (Some(u), Some(c)) = (users_c, conv_c) {
                arms.push(Arm::new(u, c));
            }
            let res = evaluate_abn(&arms, alpha, metrics)?;

            println!("\n==========================================");
            println!("   A/B/n Conversion Test");
            println!("==========================================");
            println!("\n--- Conversion Rates ---");
            println!("  A: {:.4}  ({}/{})", res.cr_a, conv_a, users_a);
            println!("  B: {:.4}  ({}/{})", res.cr_b, conv_b, users_b);
            if let (Some(cr), Some(u), Some(c)) = (res.cr_c, users_c, conv_c) {
                println!("  C: {:.4}  ({}/{})", cr, c, u);
            }
            println!("\n--- Comparisons (alpha per comparison {:.4}) ---", res.alpha_adj);
            let show = |name: &str, c: &Comparison| {
                println!(
                    "  {} vs A: p={:.4}  uplift={:+.2}%  h={:+.3}  {}",
                    name,
                    c.p_value,
                    c.uplift_pct,
                    c.cohens_h,
                    if c.significant { "SIGNIFICANT" } else { "not significant" }
                );
            };
            show("B", &res.ab);
            if let Some(ac) = &res.ac {
                show("C", ac);
            }
            if metrics > 1 {
                println!(
                    "  Adjusted for {} metrics: p={:.4} ({})",
                    metrics,
                    res.p_value_fdr,
                    if res.significant_fdr { "significant" } else { "not significant" }
                );
            }
            println!("\n  Winner: {}", res.winner);

            if let Some(k) = looks {
                let notify = |e: &StopEvent| println!(">> {}", e.message());
                let replay = replay_looks(users_a, conv_a, users_b, conv_b, alpha, k, preset, Some(&notify))?;
                println!("\n--- Sequential Replay ({}, k={}) ---", preset, k);
                for s in &replay.steps {
                    println!(
                        "  Look {}: A {}/{}  B {}/{}  p={:.4}  threshold={:.4}",
                        s.look, s.conv_a, s.users_a, s.conv_b, s.users_b, s.p_value, s.threshold
                    );
                }
                match &replay.decision {
                    Some(d) if d.stop => println!("  STOP at look {} (spent {:.4})", d.look, d.spent_alpha_cum),
                    Some(d) => println!("  Continue after look {} (spent {:.4})", d.look, d.spent_alpha_cum),
                    None => println!("  No look had users in both arms"),
                }
            }
        }

        Commands::Srm { counts, alpha } => {
            let counts = parse_counts(&counts)?;
            let res = srm_check(&counts, alpha)?;
            println!("\n--- SRM Check ---");
            for (group, obs) in &res.observed {
                println!("  {}: observed {}  expected {:.1}", group, obs, res.expected[group]);
            }
            println!("  chi2={:.4}  df={}  p={:.4e}", res.chi_square, res.df, res.p_value);
            println!("  {}", if res.passed { "PASSED" } else { "FAILED: traffic split is imbalanced" });
        }

        Commands::Plan { looks, alpha, preset } => {
            let plan = make_sequential_plan(looks, alpha, preset)?;
            println!("\n--- Sequential Plan ({}, k={}, alpha={}) ---", plan.preset, plan.k, plan.alpha);
            println!("  {:>4}  {:>10}  {:>10}", "Look", "Threshold", "Spent");
            for (i, (t, c)) in plan.thresholds.iter().zip(&plan.cumulative).enumerate() {
                println!("  {:>4}  {:>10.6}  {:>10.6}", i + 1, t, c);
            }
        }

        Commands::SampleSize { p1, p2, alpha, power } => {
            println!("\n--- Sample Size (two-sided, alpha={}, power={}) ---", alpha, power);
            match required_sample_size(p1, p2, alpha, power)? {
                Some(n) => {
                    println!("  Per group: {}", n);
                    println!("  Total:     {}", 2 * n);
                    if let Some(mde) = minimum_detectable_effect(n, alpha, power, p1)? {
                        println!("  MDE at this size: {:.4} (absolute)", mde);
                    }
                }
                None => println!("  No finite sample size: rates are equal or not positive"),
            }
        }

        Commands::Aa { baseline, users, alpha, sims, seed } => {
            let rate = aa_false_positive_rate(baseline, users, alpha, sims, seed)?;
            println!("\n--- A/A Simulation ({} runs) ---", sims);
            println!("  False positive rate: {:.4} (nominal {})", rate, alpha);
        }

        Commands::Roi { revenue_per_user, cost_per_user, budget, baseline, uplift } => {
            let roi = estimate_roi(revenue_per_user, cost_per_user, budget, baseline, uplift)?;
            println!("\n--- ROI Projection (uplift {:+.1}%) ---", uplift * 100.0);
            println!("  Users:        {:.0}", roi.users);
            println!("  Base revenue: {:.2}", roi.base_revenue);
            println!("  New revenue:  {:.2}", roi.new_revenue);
            println!("  Profit:       {:.2}", roi.profit);
            println!("  ROI:          {:.2}%", roi.roi_pct);
        }
    }
    Ok(())
}

fn print_analysis(input: &Path, data: &Dataset, cfg: &AnalysisConfig, res: &AnalysisResult) {
    println!("\n==========================================");
    println!("   A/B Analysis: {}", input.display());
    println!("==========================================");

    println!("\n--- Data Summary ---");
    println!("  Rows: {}", data.len());
    for label in data.group_labels() {
        println!("  Group {}: n={}", label, data.group_indices(&label).len());
    }
    println!("  Metric type: {}  alpha={}  sided={}", cfg.metric_type, cfg.alpha, cfg.sided);

    println!("\n--- Result ---");
    println!("  Effect:  {:.6}", res.effect);
    println!("  CI:      [{:.6}, {:.6}]", res.ci.0, res.ci.1);
    println!("  p-value: {:.6}", res.p_value);
    println!("  {}", if res.p_value < cfg.alpha { "SIGNIFICANT" } else { "not significant" });
    println!("\n  Notes: {}", res.method_notes_joined());

    if let Some(history) = res.sequential_history() {
        let joined: Vec<String> = history.iter().map(|p| format!("{}", p)).collect();
        println!("  Next --history: {}", joined.join(","));
    }

    if let Some(segs) = &res.segments {
        println!("\n--- Segments ---");
        for s in segs {
            println!(
                "  {}={:<12} n={:<6} effect={:+.4}  p_raw={:.4}  p_adj={:.4}",
                s.column, s.value, s.n, s.effect, s.p_raw, s.p_adj
            );
        }
    }
}
