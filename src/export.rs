//! Export of a decoded [`SystemState`] as environment variables of a child process.
use crate::config::ScriptConfig;
use anyhow::{Context, Result};
use dlogg_lib::protocol::{Reading, SystemState};
use log::*;
use std::process::{Command, ExitStatus};

/// Pushes the variable(s) for one reading. A heat reading expands into
/// `<name>_POWER_KW` and `<name>_ENERGY_KWH`.
fn push_reading(vars: &mut Vec<(String, String)>, name: String, reading: &Reading) {
    let value = match reading {
        Reading::Unused => String::new(),
        Reading::Digital(enabled) => u8::from(*enabled).to_string(),
        Reading::Temperature(value) => format!("{value:.1}"),
        Reading::Flow(value) => value.to_string(),
        Reading::Heat(heat) => {
            vars.push((
                format!("{name}_POWER_KW"),
                format!("{:.2}", heat.current_power_kw),
            ));
            vars.push((
                format!("{name}_ENERGY_KWH"),
                format!("{:.1}", heat.total_energy_kwh),
            ));
            return;
        }
    };
    vars.push((name, value));
}

/// Lists all values of `state` as `(name, value)` pairs.
pub fn variables(state: &SystemState, prefix: &str) -> Vec<(String, String)> {
    let mut vars = Vec::new();
    for input in state.inputs() {
        push_reading(
            &mut vars,
            format!("{prefix}INPUT_{}", input.id),
            &input.reading,
        );
        vars.push((
            format!("{prefix}INPUT_{}_KIND", input.id),
            input.kind().to_string(),
        ));
    }
    for output in state.outputs() {
        push_reading(
            &mut vars,
            format!("{prefix}OUTPUT_{}", output.id),
            &output.reading,
        );
    }
    for register in state.heat_registers() {
        push_reading(
            &mut vars,
            format!("{prefix}HEAT_{}", register.id),
            &register.reading,
        );
    }
    vars
}

/// Runs the configured script with `state` exported into its environment and waits for it.
pub fn run_script(config: &ScriptConfig, state: &SystemState) -> Result<ExitStatus> {
    debug!("Running {:?}", config.command);
    Command::new(&config.command)
        .args(&config.args)
        .envs(variables(state, &config.prefix))
        .status()
        .with_context(|| format!("Cannot run {:?}", config.command))
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlogg_lib::protocol::{parse, Heat, UVR1611};

    fn sample_state() -> SystemState {
        let mut frame = vec![0u8; 57];
        frame[0] = UVR1611;
        frame[1..3].copy_from_slice(&[219, 0x20]); // 21.9 °C
        frame[3..5].copy_from_slice(&[0x00, 0x90]); // digital on
        frame[5..7].copy_from_slice(&[0x05, 0x30]); // 20 l/h
        frame[33] = 0b0000_0010;
        frame[39] = 0b10;
        frame[48..56].copy_from_slice(&[0x80, 0x0C, 0x00, 0x00, 0x39, 0x30, 0x02, 0x00]);
        parse(&frame, UVR1611).unwrap()
    }

    fn lookup<'a>(vars: &'a [(String, String)], name: &str) -> Option<&'a str> {
        vars.iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn exported_variables() {
        let vars = variables(&sample_state(), "DLOGG_");
        assert_eq!(lookup(&vars, "DLOGG_INPUT_1"), Some("21.9"));
        assert_eq!(lookup(&vars, "DLOGG_INPUT_1_KIND"), Some("temperature"));
        assert_eq!(lookup(&vars, "DLOGG_INPUT_2"), Some("1"));
        assert_eq!(lookup(&vars, "DLOGG_INPUT_3"), Some("20"));
        assert_eq!(lookup(&vars, "DLOGG_INPUT_4"), Some(""));
        assert_eq!(lookup(&vars, "DLOGG_INPUT_4_KIND"), Some("unused"));
        assert_eq!(lookup(&vars, "DLOGG_OUTPUT_1"), Some("0"));
        assert_eq!(lookup(&vars, "DLOGG_OUTPUT_2"), Some("1"));
        assert_eq!(lookup(&vars, "DLOGG_OUTPUT_13"), Some("0"));
        assert_eq!(lookup(&vars, "DLOGG_HEAT_1_POWER_KW"), None);
        assert_eq!(lookup(&vars, "DLOGG_HEAT_2_POWER_KW"), Some("1.25"));
        assert_eq!(lookup(&vars, "DLOGG_HEAT_2_ENERGY_KWH"), Some("3234.5"));
        assert_eq!(vars.len(), 16 * 2 + 13 + 2);
    }

    #[test]
    fn heat_reading_expands() {
        let mut vars = Vec::new();
        let heat = Heat {
            current_power_kw: -0.5,
            total_energy_kwh: 12.0,
        };
        push_reading(&mut vars, "X_HEAT_1".into(), &Reading::Heat(heat));
        assert_eq!(
            vars,
            vec![
                ("X_HEAT_1_POWER_KW".to_string(), "-0.50".to_string()),
                ("X_HEAT_1_ENERGY_KWH".to_string(), "12.0".to_string()),
            ]
        );

        push_reading(&mut vars, "X_INPUT_1".into(), &Reading::Flow(-8));
        assert_eq!(vars[2], ("X_INPUT_1".to_string(), "-8".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn script_sees_variables() {
        let config = ScriptConfig {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                "test \"$X_INPUT_1\" = 21.9 && test \"$X_OUTPUT_2\" = 1".into(),
            ],
            prefix: "X_".into(),
        };
        assert!(run_script(&config, &sample_state()).unwrap().success());
    }
}
