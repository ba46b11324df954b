use clap::{ArgGroup, Parser};

/// Input command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(
    ArgGroup::new("input_mode")
        .required(true)
        .args(&["site", "list_imts"]),
))]
pub struct CmdArgs {
    /// Site parameters e.g. --site 142.5 50.1 760 (lon, lat, vs30).
    #[arg(short, long, num_args = 3, value_names = ["lon", "lat", "vs30"])]
    pub site: Option<Vec<f64>>,

    /// IMTs to compute, e.g. --imts PGA SA0P2 SA1P0.
    #[arg(short, long, num_args = 1.., default_values = ["PGA", "SA0P2", "SA1P0"])]
    pub imts: Vec<String>,

    /// Deaggregation return period in years.
    #[arg(short, long, default_value_t = 2475.0)]
    pub return_period: f64,

    /// Run a deaggregation after the hazard calculation.
    #[arg(long)]
    pub deagg: bool,

    /// Deaggregate at a fixed IML (g) instead of the return period.
    #[arg(long)]
    pub iml: Option<f64>,

    /// Worker threads; 0 uses all logical cores, 1 runs single-threaded.
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Output CSV file for hazard curves.
    ///
    /// Defaults to `out_hazard_curves.txt`.
    #[arg(short, long, default_value = "out_hazard_curves.txt")]
    pub out_file: String,

    /// Output JSON file for the deaggregation.
    #[arg(long, default_value = "out_deagg.json")]
    pub deagg_file: String,

    /// Delimiter character for output CSV files.
    ///
    /// Defaults to tab (`'\t'`).
    #[arg(short, long, default_value = "\t")]
    pub delimeter: char,

    /// List all supported IMTs.
    #[arg(short, long)]
    pub list_imts: bool,
}
