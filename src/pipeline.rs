//! # Extraction pipeline
//!
//! A fixed sequence of steps, one per asset family. The caller owns the
//! current [`PipelineStep`] and feeds it back to [`Pipeline::step`] until it
//! reaches `Finished`. An existing output root counts as a finished run.

use std::{fs, path::Path};

use tracing::info;

use crate::{
    audio_extractor::AudioExtractor,
    config::ExtractConfig,
    error::{ExtractError, Result},
    intro_extractor::IntroExtractor,
    level_extractor::LevelExtractor,
    model_extractor::ModelExtractor,
    picture_extractor::PictureExtractor,
    progress::write_progress,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStep {
    ExtractGameScreens,
    ExtractFonts,
    ExtractHud,
    ExtractSkies,
    ExtractSprites,
    ExtractTerrainTextures,
    ExtractLevels,
    ExtractMinimaps,
    ExtractMisc,
    ExtractModels,
    ExtractIntro,
    ExtractAudio,
    Finished,
}

impl PipelineStep {
    pub const ALL: [PipelineStep; 13] = [
        PipelineStep::ExtractGameScreens,
        PipelineStep::ExtractFonts,
        PipelineStep::ExtractHud,
        PipelineStep::ExtractSkies,
        PipelineStep::ExtractSprites,
        PipelineStep::ExtractTerrainTextures,
        PipelineStep::ExtractLevels,
        PipelineStep::ExtractMinimaps,
        PipelineStep::ExtractMisc,
        PipelineStep::ExtractModels,
        PipelineStep::ExtractIntro,
        PipelineStep::ExtractAudio,
        PipelineStep::Finished,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }

    pub fn description(self) -> &'static str {
        match self {
            PipelineStep::ExtractGameScreens => "Extracting game screens",
            PipelineStep::ExtractFonts => "Extracting fonts",
            PipelineStep::ExtractHud => "Extracting HUD",
            PipelineStep::ExtractSkies => "Extracting skies",
            PipelineStep::ExtractSprites => "Extracting sprites",
            PipelineStep::ExtractTerrainTextures => "Extracting terrain textures",
            PipelineStep::ExtractLevels => "Extracting levels",
            PipelineStep::ExtractMinimaps => "Extracting minimaps",
            PipelineStep::ExtractMisc => "Extracting misc images",
            PipelineStep::ExtractModels => "Extracting 3D models",
            PipelineStep::ExtractIntro => "Extracting intro animations",
            PipelineStep::ExtractAudio => "Extracting sound and music",
            PipelineStep::Finished => "Finished",
        }
    }

    /// The following step; `Finished` is terminal.
    pub fn next(self) -> Self {
        Self::ALL
            .get(self.ordinal() + 1)
            .copied()
            .unwrap_or(PipelineStep::Finished)
    }
}

pub fn initial_step(output_root: &Path) -> PipelineStep {
    if output_root.exists() {
        PipelineStep::Finished
    } else {
        PipelineStep::ExtractGameScreens
    }
}

pub struct Pipeline<'a> {
    config: &'a ExtractConfig,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ExtractConfig) -> Self {
        Pipeline { config }
    }

    /// Performs `state` and returns the step after it. Errors propagate
    /// unchanged and leave the caller's step where it was.
    pub fn step(&self, state: PipelineStep) -> Result<PipelineStep> {
        if state == PipelineStep::Finished {
            return Ok(state);
        }

        let config = self.config;
        let pictures = PictureExtractor::new(config);
        let levels = LevelExtractor::new(config);

        let written = match state {
            PipelineStep::ExtractGameScreens => pictures.extract_screens()?,
            PipelineStep::ExtractFonts => pictures.extract_fonts()?,
            PipelineStep::ExtractHud => pictures.extract_hud()?,
            PipelineStep::ExtractSkies => pictures.extract_skies()?,
            PipelineStep::ExtractSprites => pictures.extract_sprites()?,
            PipelineStep::ExtractTerrainTextures => levels.extract_terrain_textures()?,
            PipelineStep::ExtractLevels => levels.extract_levels()?,
            PipelineStep::ExtractMinimaps => levels.extract_minimaps()?,
            PipelineStep::ExtractMisc => pictures.extract_misc()?,
            PipelineStep::ExtractModels => ModelExtractor::new(config).extract_models()?,
            PipelineStep::ExtractIntro => IntroExtractor::new(config).extract_intro()?,
            PipelineStep::ExtractAudio => {
                let audio = AudioExtractor::new(config);
                audio.extract_sound()? + audio.extract_music()?
            }
            PipelineStep::Finished => 0,
        };

        let next = state.next();
        info!("{}: done ({} outputs)", state.description(), written);
        if let Some(path) = &config.progress_path {
            let status = if next == PipelineStep::Finished {
                "finished"
            } else {
                "running"
            };
            write_progress(
                path,
                next.ordinal(),
                PipelineStep::Finished.ordinal(),
                next.description(),
                status,
            );
        }
        Ok(next)
    }

    /// Steps from [`initial_step`] to `Finished`.
    pub fn run(&self) -> Result<()> {
        let mut state = initial_step(&self.config.output_root);
        if state == PipelineStep::Finished {
            info!(
                "{} already exists, nothing to do",
                self.config.output_root.display()
            );
            return Ok(());
        }
        fs::create_dir_all(&self.config.output_root)
            .map_err(|e| ExtractError::write(&self.config.output_root, e))?;

        while state != PipelineStep::Finished {
            info!(
                "[{}/{}] {}",
                state.ordinal() + 1,
                PipelineStep::Finished.ordinal(),
                state.description()
            );
            state = self.step(state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{ArchiveSource, RawImageSource},
        test_fixtures::fixture_config,
    };

    #[test]
    fn existing_root_starts_finished() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(initial_step(dir.path()), PipelineStep::Finished);
        assert_eq!(
            initial_step(&dir.path().join("assets")),
            PipelineStep::ExtractGameScreens
        );
    }

    #[test]
    fn steps_run_in_declared_order() {
        let mut state = PipelineStep::ExtractGameScreens;
        let mut seen = vec![state];
        while state != PipelineStep::Finished {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(seen, PipelineStep::ALL.to_vec());
        assert_eq!(PipelineStep::ExtractAudio.next(), PipelineStep::Finished);
    }

    #[test]
    fn finished_is_a_no_op() {
        let (_game, out, mut config) = fixture_config();
        config.output_root = out.path().join("assets");
        config.progress_path = Some(out.path().join("progress.json"));

        let pipeline = Pipeline::new(&config);
        assert_eq!(pipeline.step(PipelineStep::Finished).unwrap(), PipelineStep::Finished);
        assert!(!config.output_root.exists());
        assert!(!out.path().join("progress.json").exists());
    }

    #[test]
    fn full_run_reports_progress() {
        let (_game, out, mut config) = fixture_config();
        config.output_root = out.path().join("assets");
        let progress = out.path().join("progress.json");
        config.progress_path = Some(progress.clone());

        Pipeline::new(&config).run().unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&progress).unwrap()).unwrap();
        assert_eq!(value["current"], 12);
        assert_eq!(value["total"], 12);
        assert_eq!(value["status"], "finished");
        assert!(config.output_root.is_dir());
        assert_eq!(initial_step(&config.output_root), PipelineStep::Finished);
    }

    #[test]
    fn existing_root_runs_no_step() {
        let (_game, out, mut config) = fixture_config();
        let progress = out.path().join("progress.json");
        config.progress_path = Some(progress.clone());
        config.layout.screens = vec![RawImageSource {
            name: "title".to_string(),
            file: "MISSING.DAT".to_string(),
            width: 320,
            height: Some(200),
            palette: None,
        }];
        config.layout.music = vec!["MISSING.MUS".to_string()];

        Pipeline::new(&config).run().unwrap();
        assert!(!progress.exists());
        assert!(!out.path().join("images").exists());
    }

    #[test]
    fn step_errors_propagate_unchanged() {
        let (_game, out, mut config) = fixture_config();
        config.output_root = out.path().join("assets");
        config.layout.fonts = vec![ArchiveSource {
            name: "small".to_string(),
            tab: "MISSING.TAB".to_string(),
            dat: "MISSING.DAT".to_string(),
            palette: None,
        }];

        let err = Pipeline::new(&config)
            .step(PipelineStep::ExtractFonts)
            .unwrap_err();
        assert!(matches!(err, ExtractError::ArchiveOpen { .. }));
    }
}
