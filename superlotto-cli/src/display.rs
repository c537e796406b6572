use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::import::ImportResult;
use superlotto_db::models::{Draw, Pool};
use superlotto_engine::backtest::{BacktestSummary, PeriodOutcome};
use superlotto_engine::ensemble::calibration::{EnsembleWeights, ModelCalibration};
use superlotto_engine::enumerate::RunReport;
use superlotto_engine::features::FeatureFamily;
use superlotto_engine::predict::{PredictWarning, RankedPick};
use superlotto_engine::stats::{FeatureStatistics, HotColdInfo, PoolHeat};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn join_numbers(numbers: &[u8]) -> String {
    numbers
        .iter()
        .map(|n| format!("{:2}", n))
        .collect::<Vec<_>>()
        .join(" - ")
}

pub fn display_draws(draws: &[Draw]) {
    if draws.is_empty() {
        println!("Aucun tirage à afficher.");
        return;
    }

    let mut table = new_table();
    table.set_header(vec!["Période", "Date", "Boules", "Étoiles"]);
    for draw in draws {
        table.add_row(vec![
            draw.period.to_string(),
            draw.date.clone(),
            join_numbers(&draw.balls),
            join_numbers(&draw.stars),
        ]);
    }
    println!("{table}");
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import terminé :");
    println!("  Total lignes lues : {}", result.total_records);
    println!("  Insérés           : {}", result.inserted);
    println!("  Doublons ignorés  : {}", result.skipped);
    if result.errors > 0 {
        println!("  Erreurs           : {}", result.errors);
    }
}

pub fn display_statistics(stats: &FeatureStatistics, heat: &HotColdInfo) {
    println!("\n📊 Statistiques sur {} tirages\n", stats.periods());

    let forecast = stats.predict_next();
    for family in FeatureFamily::ALL {
        println!("── {} ──", family);
        let mut table = new_table();
        table.set_header(vec!["Valeur", "Fréquence", "Prochaine période"]);

        let marginal = stats.marginal(family);
        let next = forecast.get(&family);
        for (value, p) in &marginal {
            let next_p = next
                .and_then(|d| d.get(value))
                .map(|q| format!("{:.1} %", q * 100.0))
                .unwrap_or_else(|| "—".to_string());
            table.add_row(vec![family.label(*value), format!("{:.1} %", p * 100.0), next_p]);
        }
        println!("{table}\n");
    }

    println!("── Chaud / froid ({} derniers tirages) ──", heat.window);
    display_heat(heat.pool(Pool::Balls), "Boules");
    display_heat(heat.pool(Pool::Stars), "Étoiles");
}

fn display_heat(heat: &PoolHeat, label: &str) {
    let mut table = new_table();
    table.set_header(vec![label, "Numéros"]);
    table.add_row(vec![Cell::new("Chauds"), Cell::new(join_numbers(&heat.hot)).fg(Color::Red)]);
    table.add_row(vec![Cell::new("Froids"), Cell::new(join_numbers(&heat.cold)).fg(Color::Blue)]);
    table.add_row(vec![
        Cell::new("Très froids"),
        Cell::new(join_numbers(&heat.super_cold)).fg(Color::Cyan),
    ]);
    println!("{table}");
}

pub fn display_warnings(warnings: &[PredictWarning]) {
    for w in warnings {
        println!("⚠ {w}");
    }
}

pub fn display_ranking(picks: &[RankedPick], explain: bool) {
    if picks.is_empty() {
        println!("Aucune grille ne satisfait les contraintes.");
        return;
    }

    println!("\n🎲 Classement\n");
    let mut table = new_table();
    table.set_header(vec!["#", "Boules", "Étoiles", "Score", "Grilles"]);
    for pick in picks {
        table.add_row(vec![
            pick.rank.to_string(),
            join_numbers(&pick.balls),
            join_numbers(&pick.stars),
            format!("{:.1}", pick.score),
            pick.combination_count.to_string(),
        ]);
    }
    println!("{table}");

    if explain {
        for pick in picks {
            println!("\n#{} {} | {}", pick.rank, join_numbers(&pick.balls), join_numbers(&pick.stars));
            println!("{}", pick.explanation);
        }
    }
}

pub fn display_report(report: &RunReport) {
    println!(
        "\n{} sous-ensembles de boules, {} grilles notées, {} rejetées",
        report.ball_subsets,
        report.scored,
        report.total_rejected()
    );
    let counts = report.rejection_counts();
    if counts.is_empty() {
        return;
    }
    let mut table = new_table();
    table.set_header(vec!["Motif de rejet", "Grilles"]);
    for (rejection, count) in counts {
        table.add_row(vec![rejection.to_string(), count.to_string()]);
    }
    println!("{table}");
}

pub fn display_period(outcome: &PeriodOutcome) {
    match outcome {
        PeriodOutcome::Evaluated(r) => println!(
            "{:>6}  top1 {}  meilleur {}  moy. {:.2}+{:.2}  couverture {:.1} %",
            r.period,
            r.top1,
            r.best,
            r.avg_best_balls,
            r.avg_best_stars,
            r.coverage * 100.0
        ),
        PeriodOutcome::Skipped { period, available } => {
            println!("{:>6}  ignorée ({} tirages antérieurs)", period, available)
        }
    }
}

pub fn display_backtest_summary(summary: &BacktestSummary) {
    println!("\n== Backtest ==\n");
    println!("  Périodes évaluées : {}", summary.evaluated);
    if !summary.skipped.is_empty() {
        println!("  Périodes ignorées : {}", summary.skipped.len());
    }
    println!(
        "  Top 1 moyen       : {:.2} boules, {:.2} étoiles",
        summary.avg_top1_balls, summary.avg_top1_stars
    );
    println!(
        "  Meilleur moyen    : {:.2} boules, {:.2} étoiles",
        summary.avg_best_balls, summary.avg_best_stars
    );
    println!(
        "  Couverture {}   : {:.1} %",
        summary.target,
        summary.coverage * 100.0
    );
    println!(
        "  Couverture {}   : {:.1} %",
        summary.soft_target,
        summary.soft_coverage * 100.0
    );

    let mut table = new_table();
    table.set_header(vec!["Classe", "Périodes", "Part"]);
    for (class, count) in summary.class_distribution.iter().rev() {
        let share = *count as f64 / summary.evaluated.max(1) as f64;
        let bar = "█".repeat((share * 30.0).round() as usize);
        table.add_row(vec![
            class.to_string(),
            count.to_string(),
            format!("{:5.1} % {}", share * 100.0, bar),
        ]);
    }
    println!("{table}");
}

pub fn display_calibration_results(calibrations: &[ModelCalibration], windows: &[usize]) {
    let mut table = new_table();
    let mut header = vec!["Modèle".to_string()];
    for w in windows {
        header.push(format!("w={}", w));
    }
    header.push("Meilleure".to_string());
    table.set_header(header);

    for cal in calibrations {
        let mut row: Vec<String> = vec![cal.model_name.clone()];
        for w in windows {
            let ll = cal
                .results
                .iter()
                .find(|r| r.window == *w)
                .filter(|r| r.log_likelihood.is_finite())
                .map(|r| format!("{:.3}", r.log_likelihood))
                .unwrap_or_else(|| "—".to_string());
            row.push(ll);
        }
        row.push(format!("w={} ({:.3})", cal.best_window, cal.best_ll));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_weights(weights: &EnsembleWeights) {
    println!("\n== Poids de l'ensemble ==\n");

    for (label, table_weights) in [("Boules", &weights.ball_weights), ("Étoiles", &weights.star_weights)] {
        println!("── {label} ──");
        let mut table = new_table();
        table.set_header(vec!["Modèle", "Poids", "Contribution"]);
        for (name, weight) in table_weights {
            let bar = "█".repeat((weight * 30.0).round() as usize);
            table.add_row(vec![name.clone(), format!("{:.4}", weight), bar]);
        }
        println!("{table}");
    }
}
