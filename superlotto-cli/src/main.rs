mod display;
mod import;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use superlotto_db::db::{count_draws, db_path, fetch_last_draws, insert_draw, load_history, migrate, open_db};
use superlotto_db::models::{Draw, History, Pool};
use superlotto_db::rusqlite::Connection;
use superlotto_engine::backtest::Backtester;
use superlotto_engine::ensemble::calibration::{compute_weights, calibrate_model, load_weights, save_weights, EnsembleWeights};
use superlotto_engine::ensemble::EnsembleModel;
use superlotto_engine::enumerate::Progress;
use superlotto_engine::filter::Constraints;
use superlotto_engine::models::{all_models, model_by_name, ProbabilityModel};
use superlotto_engine::scoring::ReferenceNumbers;
use superlotto_engine::stats::{FeatureStatistics, HotColdInfo};
use superlotto_engine::{Arity, EngineConfig, Outcome, PredictRequest, Predictor, RankedPick, SearchMode};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::display::{
    display_backtest_summary, display_calibration_results, display_draws, display_import_summary, display_period,
    display_ranking, display_report, display_statistics, display_warnings, display_weights,
};

#[derive(Parser)]
#[command(name = "superlotto", about = "Classement de grilles 5/35 + 2/12")]
struct Cli {
    /// Niveau de log par défaut (surchargé par RUST_LOG)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Importer les tirages depuis un fichier CSV
    Import {
        /// Chemin vers le fichier CSV (période;date;b1..b5;e1;e2)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Afficher le chemin de la base de données
    DbPath,

    /// Lister les derniers tirages
    List {
        #[arg(short, long, default_value = "10")]
        last: u32,
    },

    /// Ajouter un tirage manuellement
    Add,

    /// Statistiques des caractéristiques et numéros chauds/froids
    Stats {
        /// Fenêtre chaud/froid (nombre de tirages)
        #[arg(short, long, default_value = "20")]
        window: usize,

        /// Sortie JSON
        #[arg(long)]
        json: bool,
    },

    /// Classer les grilles pour une période
    Predict {
        /// Période cible (défaut : dernière période connue + 1)
        #[arg(short, long)]
        period: Option<u32>,

        /// Nombre de grilles à retenir
        #[arg(short, long, default_value = "20")]
        count: usize,

        /// Boules exclues, séparées par des virgules
        #[arg(long, value_delimiter = ',')]
        exclude_balls: Vec<u8>,

        /// Étoiles exclues, séparées par des virgules
        #[arg(long, value_delimiter = ',')]
        exclude_stars: Vec<u8>,

        /// Intervalle de somme des boules, ex. 80-120
        #[arg(long, value_parser = parse_sum_range)]
        sum_range: Option<(u16, u16)>,

        /// Répartition impairs:pairs, ex. 3:2
        #[arg(long, value_parser = parse_odd_even)]
        odd_even: Option<u8>,

        /// Grilles composées 8+3
        #[arg(long)]
        compound: bool,

        /// Parcours échantillonné par stratégies au lieu du parcours exhaustif
        #[arg(long)]
        sampled: bool,

        #[arg(long)]
        seed: Option<u64>,

        /// Fichier de configuration JSON
        #[arg(long)]
        config: Option<PathBuf>,

        /// Modèle de probabilités (nom ou « ensemble »)
        #[arg(short, long)]
        model: Option<String>,

        /// Poids calibrés pour l'ensemble
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Table JSON des numéros recommandés par une source externe
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Durée maximale du parcours en secondes
        #[arg(long)]
        max_seconds: Option<u64>,

        /// Détailler le score de chaque grille
        #[arg(long)]
        explain: bool,
    },

    /// Rejouer les périodes passées
    Backtest {
        #[arg(long)]
        start: u32,

        #[arg(long)]
        end: u32,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        model: Option<String>,

        #[arg(long)]
        calibration: Option<PathBuf>,

        #[arg(long)]
        sampled: bool,

        #[arg(long)]
        compound: bool,

        /// Durée maximale du backtest en secondes
        #[arg(long)]
        max_seconds: Option<u64>,
    },

    /// Calibrer les modèles et calculer les poids de l'ensemble
    Calibrate {
        /// Fenêtres à tester, séparées par des virgules
        #[arg(short, long, default_value = "20,30,40,50,60,80,100")]
        windows: String,

        #[arg(short, long, default_value = "calibration.json")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let path = db_path();
    let conn = open_db(&path)?;
    migrate(&conn)?;

    match cli.command {
        Command::Import { file } => cmd_import(&conn, &file),
        Command::DbPath => {
            println!("{}", path.display());
            Ok(())
        }
        Command::List { last } => cmd_list(&conn, last),
        Command::Add => cmd_add(&conn),
        Command::Stats { window, json } => cmd_stats(&conn, window, json),
        Command::Predict {
            period,
            count,
            exclude_balls,
            exclude_stars,
            sum_range,
            odd_even,
            compound,
            sampled,
            seed,
            config,
            model,
            calibration,
            reference,
            max_seconds,
            explain,
        } => {
            let constraints = Constraints {
                excluded_balls: exclude_balls,
                excluded_stars: exclude_stars,
                sum_range,
                odd_count: odd_even,
            };
            let options = PredictOptions {
                period,
                count,
                constraints,
                arity: arity_for(compound),
                search: search_for(sampled),
                seed,
                reference,
                max_seconds,
                explain,
            };
            cmd_predict(&conn, options, config.as_deref(), model.as_deref(), calibration.as_deref())
        }
        Command::Backtest {
            start,
            end,
            config,
            model,
            calibration,
            sampled,
            compound,
            max_seconds,
        } => cmd_backtest(
            &conn,
            start,
            end,
            config.as_deref(),
            model.as_deref(),
            calibration.as_deref(),
            search_for(sampled),
            arity_for(compound),
            max_seconds,
        ),
        Command::Calibrate { windows, output } => cmd_calibrate(&conn, &windows, &output),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn arity_for(compound: bool) -> Arity {
    if compound {
        Arity::COMPOUND
    } else {
        Arity::SINGLE
    }
}

fn search_for(sampled: bool) -> SearchMode {
    if sampled {
        SearchMode::Sampled
    } else {
        SearchMode::Exhaustive
    }
}

fn parse_sum_range(raw: &str) -> Result<(u16, u16), String> {
    let (lo, hi) = raw
        .split_once('-')
        .ok_or_else(|| format!("intervalle attendu sous la forme a-b : {raw}"))?;
    let lo = lo.trim().parse::<u16>().map_err(|e| e.to_string())?;
    let hi = hi.trim().parse::<u16>().map_err(|e| e.to_string())?;
    Ok((lo, hi))
}

fn parse_odd_even(raw: &str) -> Result<u8, String> {
    let (odd, even) = raw
        .split_once(':')
        .ok_or_else(|| format!("répartition attendue sous la forme i:p : {raw}"))?;
    let odd = odd.trim().parse::<u8>().map_err(|e| e.to_string())?;
    let even = even.trim().parse::<u8>().map_err(|e| e.to_string())?;
    if odd as usize + even as usize != Pool::Balls.pick_count() {
        return Err(format!("{odd}:{even} ne totalise pas {} boules", Pool::Balls.pick_count()));
    }
    Ok(odd)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::load(p).with_context(|| format!("Configuration illisible : {}", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn resolve_model(name: Option<&str>, calibration: Option<&Path>) -> Result<Option<Box<dyn ProbabilityModel>>> {
    let Some(name) = name else {
        return Ok(None);
    };
    if name.eq_ignore_ascii_case("ensemble") {
        let models = all_models();
        let ensemble = match calibration {
            Some(path) => {
                let weights = load_weights(path)
                    .context("Impossible de charger le fichier de calibration. Lancez d'abord : superlotto calibrate")?;
                EnsembleModel::from_calibration(models, &weights)
            }
            None => EnsembleModel::new(models),
        };
        return Ok(Some(Box::new(ensemble)));
    }
    model_by_name(name)
        .map(Some)
        .with_context(|| format!("Modèle inconnu : {name}"))
}

fn require_history(conn: &Connection) -> Result<History> {
    if count_draws(conn)? == 0 {
        bail!("Base vide. Lancez d'abord : superlotto import");
    }
    load_history(conn)
}

fn cmd_import(conn: &Connection, file: &Path) -> Result<()> {
    let result = import::import_csv(conn, file)?;
    display_import_summary(&result);
    Ok(())
}

fn cmd_list(conn: &Connection, last: u32) -> Result<()> {
    if count_draws(conn)? == 0 {
        println!("Base vide. Lancez d'abord : superlotto import");
        return Ok(());
    }
    let draws = fetch_last_draws(conn, last)?;
    display_draws(&draws);
    Ok(())
}

fn cmd_stats(conn: &Connection, window: usize, json: bool) -> Result<()> {
    let history = require_history(conn)?;
    let config = EngineConfig::default();
    let stats = FeatureStatistics::build(history.draws());
    let heat = HotColdInfo::compute(history.draws(), window, config.strategy.super_cold_gap);

    if json {
        let value = serde_json::json!({
            "statistics": stats,
            "next": stats.predict_next(),
            "hot_cold": heat,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        display_statistics(&stats, &heat);
    }
    Ok(())
}

/// Vrai une fois le délai écoulé ; jamais sans délai.
fn deadline(max_seconds: Option<u64>) -> impl Fn() -> bool {
    let deadline = max_seconds.map(|s| Instant::now() + Duration::from_secs(s));
    move || deadline.is_some_and(|d| Instant::now() >= d)
}

struct PredictOptions {
    period: Option<u32>,
    count: usize,
    constraints: Constraints,
    arity: Arity,
    search: SearchMode,
    seed: Option<u64>,
    reference: Option<PathBuf>,
    max_seconds: Option<u64>,
    explain: bool,
}

fn progress_bar(total: Option<u64>) -> Result<ProgressBar> {
    let pb = match total {
        Some(n) => {
            let pb = ProgressBar::new(n);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            pb
        }
        None => ProgressBar::new_spinner(),
    };
    Ok(pb)
}

fn cmd_predict(
    conn: &Connection,
    options: PredictOptions,
    config_path: Option<&Path>,
    model_name: Option<&str>,
    calibration: Option<&Path>,
) -> Result<()> {
    let history = require_history(conn)?;
    let config = load_config(config_path)?;
    let model = resolve_model(model_name, calibration)?;

    let target = match options.period {
        Some(p) => p,
        None => history.latest().map(|d| d.period + 1).unwrap_or(1),
    };

    let mut request = PredictRequest::new(target);
    request.count = options.count;
    request.constraints = options.constraints;
    request.arity = options.arity;
    request.search = options.search;
    request.seed = options.seed;
    if let Some(path) = &options.reference {
        let reference = ReferenceNumbers::load(path)
            .with_context(|| format!("Impossible de charger la référence {}", path.display()))?;
        debug!(balls = reference.balls.len(), stars = reference.stars.len(), "référence chargée");
        request.reference = Some(reference);
    }

    let mut predictor = Predictor::new(&history, &config);
    if let Some(m) = model.as_deref() {
        predictor = predictor.with_model(m);
    }

    let cancel = deadline(options.max_seconds);

    info!(period = target, arity = %request.arity, "classement");
    let mut pb: Option<ProgressBar> = None;
    let mut on_progress = |p: Progress| {
        if pb.is_none() {
            pb = progress_bar(p.total).ok();
        }
        if let Some(bar) = &pb {
            bar.set_position(p.ball_subsets);
            bar.set_message(format!("{} notées, {} retenues", p.scored, p.retained));
        }
    };

    let outcome = predictor.predict(&request, &cancel, &mut on_progress)?;
    if let Some(bar) = &pb {
        bar.finish_with_message("Parcours terminé");
    }

    let mut ranking = match outcome {
        Outcome::Completed(ranking) => ranking,
        Outcome::Cancelled => {
            println!("Parcours interrompu (délai dépassé) : aucun classement.");
            return Ok(());
        }
    };

    display_warnings(ranking.warnings());
    let report = ranking.report().clone();
    let picks: Vec<RankedPick> = ranking.by_ref().collect();
    debug!(picks = picks.len(), "classement matérialisé");

    display_report(&report);
    display_ranking(&picks, options.explain);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_backtest(
    conn: &Connection,
    start: u32,
    end: u32,
    config_path: Option<&Path>,
    model_name: Option<&str>,
    calibration: Option<&Path>,
    search: SearchMode,
    arity: Arity,
    max_seconds: Option<u64>,
) -> Result<()> {
    if start > end {
        bail!("Période de début {start} postérieure à la fin {end}");
    }
    let history = require_history(conn)?;
    let config = load_config(config_path)?;
    let model = resolve_model(model_name, calibration)?;

    let mut backtester = Backtester::new(&history, &config).with_arity(arity).with_search(search);
    if let Some(m) = model.as_deref() {
        backtester = backtester.with_model(m);
    }

    let cancel = deadline(max_seconds);
    let outcome = backtester.run(start, end, &cancel, &mut |p| display_period(p))?;
    match outcome {
        Outcome::Completed(summary) => display_backtest_summary(&summary),
        Outcome::Cancelled => println!("Backtest interrompu (délai dépassé)."),
    }
    Ok(())
}

fn cmd_calibrate(conn: &Connection, windows_str: &str, output: &Path) -> Result<()> {
    let history = require_history(conn)?;

    let windows: Vec<usize> = windows_str
        .split(',')
        .map(|s| s.trim().parse::<usize>())
        .collect::<Result<_, _>>()
        .context("Format de fenêtres invalide")?;

    let draws = history.draws();
    let models = all_models();

    println!(
        "Calibration de {} modèles sur {} tirages avec {} fenêtres...",
        models.len(),
        draws.len(),
        windows.len()
    );

    let pb = progress_bar(Some((models.len() * 2) as u64))?;
    let mut ball_calibrations = Vec::with_capacity(models.len());
    let mut star_calibrations = Vec::with_capacity(models.len());

    for model in &models {
        pb.set_message(format!("{} (boules)", model.name()));
        ball_calibrations.push(calibrate_model(model.as_ref(), draws, &windows, Pool::Balls)?);
        pb.inc(1);

        pb.set_message(format!("{} (étoiles)", model.name()));
        star_calibrations.push(calibrate_model(model.as_ref(), draws, &windows, Pool::Stars)?);
        pb.inc(1);
    }
    pb.finish_with_message("Calibration terminée");

    println!("\n── Boules ──");
    display_calibration_results(&ball_calibrations, &windows);
    println!("\n── Étoiles ──");
    display_calibration_results(&star_calibrations, &windows);

    let weights = EnsembleWeights {
        ball_weights: compute_weights(&ball_calibrations, Pool::Balls),
        star_weights: compute_weights(&star_calibrations, Pool::Stars),
        calibrations: ball_calibrations.into_iter().chain(star_calibrations).collect(),
    };
    display_weights(&weights);

    save_weights(&weights, output)?;
    println!("\nPoids sauvegardés dans : {}", output.display());
    Ok(())
}

fn cmd_add(conn: &Connection) -> Result<()> {
    println!("Ajout d'un tirage manuellement\n");

    let period: u32 = prompt("Période (ex: 2024101) : ")?
        .parse()
        .context("Période invalide")?;
    let date = import::parse_date(&prompt("Date (JJ/MM/AAAA ou AAAA-MM-JJ) : ")?)?;
    let balls = prompt_numbers::<5>("5 boules (séparées par des espaces, 1-35) : ")?;
    let stars = prompt_numbers::<2>("2 étoiles (séparées par un espace, 1-12) : ")?;

    let draw = Draw::new(period, date, balls, stars)?;

    println!("\nTirage à insérer :");
    display_draws(std::slice::from_ref(&draw));

    let confirm = prompt("\nConfirmer l'insertion ? (o/n) : ")?;
    if confirm.to_lowercase() == "o" {
        if insert_draw(conn, &draw)? {
            println!("Tirage inséré avec succès.");
        } else {
            println!("Ce tirage existe déjà (doublon ignoré).");
        }
    } else {
        println!("Insertion annulée.");
    }
    Ok(())
}

fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input).context("Erreur de lecture")?;
    Ok(input.trim().to_string())
}

fn prompt_numbers<const N: usize>(msg: &str) -> Result<[u8; N]> {
    loop {
        let input = prompt(msg)?;
        let parsed: Result<Vec<u8>, _> = input.split_whitespace().map(|s| s.parse::<u8>()).collect();
        match parsed.ok().and_then(|v| <[u8; N]>::try_from(v).ok()) {
            Some(arr) => return Ok(arr),
            None => println!("Entrez exactement {} numéros. Réessayez.", N),
        }
    }
}
