mod cmd_args;
mod demo;

use clap::Parser;
use log::info;
use seismic_hazard_lib::config::CalcConfig;
use seismic_hazard_lib::deagg::Deaggregation;
use seismic_hazard_lib::deagg_summary::{ranked_contributors, DeaggSummary};
use seismic_hazard_lib::imt::{Imt, ALL_IMTS};
use seismic_hazard_lib::pipeline::calc_hazard;
use seismic_hazard_lib::source::Site;
use seismic_hazard_lib::writers::{write_deagg_json, write_deagg_rme, write_hazard_curves};

use crate::cmd_args::CmdArgs;
use std::error::Error;
use std::sync::Arc;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cmd_args = CmdArgs::parse();

    if cmd_args.list_imts {
        for imt in ALL_IMTS {
            println!("{imt}");
        }
        return Ok(());
    }

    let Some(ref site_args) = cmd_args.site else {
        return Err("missing --site".into());
    };
    let site = Site::new("site", site_args[0], site_args[1], site_args[2]);
    println!("Site {site:?}");

    let imts = cmd_args
        .imts
        .iter()
        .map(|s| s.parse::<Imt>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut config = CalcConfig::default();
    config.hazard.imts = imts;
    config.performance.thread_count = cmd_args.threads;
    config.deagg.return_period = cmd_args.return_period;
    config.deagg.iml = cmd_args.iml;
    let config = Arc::new(config);

    let model = demo::demo_model()?;
    info!("computing hazard for model '{}'", model.name);
    let hazard = calc_hazard(&model, &site, &config, cmd_args.deagg)?;

    for (imt, curve) in &hazard.total_curves {
        let linear = curve.to_linear_x();
        let max_rate = linear.ys().iter().cloned().fold(f64::MIN, f64::max);
        println!(
            "{imt}: {} points, max annual rate {max_rate:.4e}",
            linear.len()
        );
    }

    let delim = cmd_args.delimeter as u8;
    println!("Write hazard curves to {}...", cmd_args.out_file);
    write_hazard_curves(&hazard, &cmd_args.out_file, delim)?;

    if cmd_args.deagg {
        let deagg = match cmd_args.iml {
            Some(iml) => Deaggregation::at_iml(&hazard, iml, None)?,
            None => Deaggregation::at_return_period(&hazard, cmd_args.return_period, None)?,
        };
        for (imt, imt_deagg) in &deagg.deaggs {
            let total = &imt_deagg.total;
            let summary = DeaggSummary::of(total, total.total_rate());
            println!(
                "{imt} deagg at {:.4} g: rBar {:.1} km, mBar {:.2}, εBar {:.2}",
                imt_deagg.config.iml_linear,
                summary.r_bar.unwrap_or(f64::NAN),
                summary.m_bar.unwrap_or(f64::NAN),
                summary.eps_bar.unwrap_or(f64::NAN),
            );
            let ranked = ranked_contributors(
                total,
                total.total_rate(),
                imt_deagg.config.contributor_limit,
            );
            for entry in &ranked {
                println!("  {:>6.2}%  {}", entry.contribution, entry.name);
                for child in &entry.children {
                    println!("    {:>6.2}%  {}", child.contribution, child.name);
                }
            }
        }
        println!("Write deaggregation to {}...", cmd_args.deagg_file);
        write_deagg_json(&deagg, &cmd_args.deagg_file)?;
        let rme_file = format!("{}.rme.txt", cmd_args.deagg_file);
        write_deagg_rme(&deagg, &rme_file, delim)?;
    }

    println!("Done");
    Ok(())
}
