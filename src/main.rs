use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use refocus::{io, Autofocus, Kernel, Metric, Minimizer, Roi, SearchGrid, Settings, WorkerPool};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "refocus", about = "Refocusing and autofocusing of complex wavefields")]
struct Opt {
    /// Real part of the field, repeated for a stack of fields
    #[structopt(long, parse(from_os_str), required = true, number_of_values = 1)]
    real: Vec<PathBuf>,
    /// Imaginary part of the field, repeated for a stack of fields
    #[structopt(long, parse(from_os_str), required = true, number_of_values = 1)]
    imag: Vec<PathBuf>,
    /// Column delimiter of the text files: a character, "space" or "tab"
    #[structopt(long, default_value = ",")]
    delimiter: String,
    /// JSON settings file
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,
    /// Wavelength
    #[structopt(short, long)]
    wavelength: Option<f64>,
    /// Pixel size
    #[structopt(short, long)]
    pixel_size: Option<f64>,
    /// Refractive index of the medium
    #[structopt(short = "n", long)]
    medium_index: Option<f64>,
    /// Propagation kernel: helmholtz or fresnel
    #[structopt(short, long)]
    kernel: Option<Kernel>,
    /// Disables the padding of the field
    #[structopt(long)]
    no_padding: bool,
    /// Refocusing distance
    #[structopt(short, long, allow_hyphen_values = true)]
    distance: Option<f64>,
    /// Autofocus interval
    #[structopt(short, long, number_of_values = 2, allow_hyphen_values = true)]
    interval: Option<Vec<f64>>,
    /// Focus metric
    #[structopt(short, long)]
    metric: Option<Metric>,
    /// Minimizer: lmfit or legacy
    #[structopt(long)]
    minimizer: Option<Minimizer>,
    /// Region of interest, e.g. "[10, 10, 90, 90]"
    #[structopt(long)]
    roi: Option<Roi>,
    /// Writes the autofocus search grid to `<output>_grid.csv`
    #[structopt(long)]
    grid: bool,
    /// Number of worker threads for a stack, 0 for every logical CPU
    #[structopt(short = "j", long)]
    workers: Option<usize>,
    /// Output files prefix
    #[structopt(short, long, default_value = "refocused")]
    output: String,
}

/// Output prefix of the field `index` of a stack of `len` fields
fn prefix(output: &str, index: usize, len: usize) -> String {
    if len > 1 {
        format!("{output}_{index}")
    } else {
        output.to_string()
    }
}

fn write_grid(path: String, grid: &SearchGrid) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(["distance", "metric"])?;
    for (d, v) in grid.distances.iter().zip(&grid.values) {
        wtr.write_record([d.to_string(), v.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}

fn delimiter(arg: &str) -> anyhow::Result<u8> {
    match arg {
        "space" => Ok(b' '),
        "tab" => Ok(b'\t'),
        _ if arg.len() == 1 => Ok(arg.as_bytes()[0]),
        _ => Err(anyhow!("invalid delimiter: {arg:?}")),
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let mut settings = match (&opt.config, opt.wavelength, opt.pixel_size) {
        (Some(path), ..) => Settings::from_path(path)
            .with_context(|| format!("failed to load {path:?}"))?,
        (None, Some(wavelength), Some(pixel_size)) => {
            Settings::new(refocus::RefocusConfig::new(wavelength, pixel_size))
        }
        _ => bail!("either a settings file or the wavelength and pixel size are required"),
    };
    let mut config = settings.refocus.clone();
    if let Some(arg) = opt.wavelength {
        config = config.wavelength(arg);
    }
    if let Some(arg) = opt.pixel_size {
        config = config.pixel_size(arg);
    }
    if let Some(arg) = opt.medium_index {
        config = config.medium_index(arg);
    }
    if let Some(arg) = opt.kernel {
        config = config.kernel(arg);
    }
    if opt.no_padding {
        config = config.padding(false);
    }
    settings.refocus = config;

    if let Some(arg) = opt.workers {
        settings.workers = arg;
    }

    if opt.real.len() != opt.imag.len() {
        bail!(
            "{} real parts for {} imaginary parts",
            opt.real.len(),
            opt.imag.len()
        );
    }
    let delimiter = delimiter(&opt.delimiter)?;
    let fields = opt
        .real
        .iter()
        .zip(&opt.imag)
        .map(|(real, imag)| io::read_field(real, imag, delimiter))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("{} field(s) {:?} loaded", fields.len(), fields[0].shape());
    let pool = WorkerPool::new(settings.workers)?.progress(fields.len() > 1);
    let n = fields.len();

    if let Some(distance) = opt.distance {
        let refocused = pool.map(&fields, |field| {
            let mut rf = settings.refocus.build(field.clone())?;
            Ok(rf.propagate(distance))
        })?;
        for (i, field) in refocused.iter().enumerate() {
            io::write_field(&prefix(&opt.output, i, n), field, delimiter)?;
        }
        return Ok(());
    }

    let mut autofocus = match (settings.autofocus.take(), &opt.interval) {
        (Some(config), _) => config,
        (None, Some(_)) => Default::default(),
        (None, None) => bail!("either a distance or an autofocus interval is required"),
    };
    if let Some(interval) = &opt.interval {
        autofocus = autofocus.interval((interval[0], interval[1]));
    }
    if let Some(arg) = opt.metric {
        autofocus = autofocus.metric(arg);
    }
    if let Some(arg) = opt.minimizer {
        autofocus = autofocus.minimizer(arg);
    }
    if let Some(arg) = opt.roi {
        autofocus = autofocus.roi(arg);
    }
    let autofocus = autofocus.return_field(true).return_grid(opt.grid);
    let results: Vec<Autofocus> = pool.map(&fields, |field| {
        settings.refocus.build(field.clone())?.autofocus(&autofocus)
    })?;
    for (i, af) in results.iter().enumerate() {
        println!("{}", af.distance);
        let name = prefix(&opt.output, i, n);
        if let Some(field) = &af.field {
            io::write_field(&name, field, delimiter)?;
        }
        if let Some(grid) = &af.grid {
            write_grid(format!("{name}_grid.csv"), grid)?;
        }
    }
    Ok(())
}
