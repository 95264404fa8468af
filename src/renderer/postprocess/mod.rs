// renderer/postprocess/mod.rs
// Screen-space fade effects drawn on top of the finished scene

use glam::{Mat4, Vec2, Vec4};

use super::draw::{screen_quad, BlendMode, DrawBackend, DrawCommand, TargetId, TextureId};
use super::matrices::Viewport;
use super::targets::{RenderTargetCache, TargetFactory};
use crate::scene::{Effect, EffectKind, FadeEffect};

const SCENE_COLOR_UNIT: u32 = 0;
const SCENE_DEPTH_UNIT: u32 = 1;
const PASS_INPUT_UNIT: u32 = 2;

const FULL_SCREEN: Vec4 = Vec4::new(0.0, 0.0, 1.0, 1.0);

/// `(0, 0)` is the bottom-left and `(1, 1)` the top-right of the viewport.
pub fn screen_projection() -> Mat4 {
    Mat4::orthographic_rh(0.0, 1.0, 0.0, 1.0, -1.0, 1.0)
}

/// Off-screen copy of the main scene, read by shader fades.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTexture {
    pub target: TargetId,
    pub color: TextureId,
    pub depth: Option<TextureId>,
}

/// Sets up screen space: ortho projection, identity view, no depth test.
pub fn begin_screen_space(backend: &mut dyn DrawBackend) {
    backend.submit(DrawCommand::SetLighting(false));
    backend.submit(DrawCommand::SetDepthTest(None));
    backend.submit(DrawCommand::SetProjection(screen_projection()));
    backend.submit(DrawCommand::SetView(Mat4::IDENTITY));
    backend.submit(DrawCommand::SetModel(Mat4::IDENTITY));
    backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
}

/// Copies the scene texture onto the screen, unblended.
pub fn blit_scene(backend: &mut dyn DrawBackend, scene: &SceneTexture) {
    backend.submit(DrawCommand::SetBlend(None));
    backend.submit(DrawCommand::BindTexture {
        unit: SCENE_COLOR_UNIT,
        texture: Some(scene.color),
    });
    backend.submit(DrawCommand::SetColor(Vec4::ONE));
    backend.submit(DrawCommand::DrawQuads(
        screen_quad(FULL_SCREEN, Vec2::ONE, Vec4::ONE).to_vec(),
    ));
    backend.submit(DrawCommand::SetBlend(Some(BlendMode::ALPHA)));
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FadeStatistics {
    pub direct: u32,
    pub shader_passes: u32,
    pub skipped: u32,
}

/// Draws fades in screen space. Plain fades are coloured quads; fades with
/// shader passes read the scene texture and chain their passes through
/// cached render targets.
pub struct FadeCompositor<'a> {
    pub backend: &'a mut dyn DrawBackend,
    pub factory: &'a mut dyn TargetFactory,
    pub cache: &'a mut RenderTargetCache,
    pub viewport: Viewport,
}

impl FadeCompositor<'_> {
    /// `scene` is `None` when the frame was not rendered to a texture, which
    /// leaves shader fades out.
    pub fn render(
        &mut self,
        effects: &[Effect],
        fades: &[usize],
        scene: Option<SceneTexture>,
    ) -> FadeStatistics {
        let mut stats = FadeStatistics::default();
        let fades: Vec<&FadeEffect> = fades
            .iter()
            .filter_map(|&index| match effects.get(index) {
                Some(Effect {
                    kind: EffectKind::Fade(fade),
                    ..
                }) => Some(fade),
                _ => None,
            })
            .collect();
        if fades.is_empty() {
            return stats;
        }

        self.backend
            .submit(DrawCommand::SetProjection(screen_projection()));
        self.backend.submit(DrawCommand::BindTexture {
            unit: SCENE_COLOR_UNIT,
            texture: None,
        });

        // screen space starts out alpha blended
        let mut screen_blend = Some(BlendMode::ALPHA);
        for fade in fades.iter().filter(|fade| fade.pass_count() == 0) {
            self.backend.submit(DrawCommand::SetBlend(Some(fade.blend)));
            screen_blend = Some(fade.blend);
            self.backend.submit(DrawCommand::SetColor(fade.color));
            self.backend.submit(DrawCommand::DrawQuads(
                screen_quad(fade.geometry, Vec2::ONE, fade.color).to_vec(),
            ));
            stats.direct += 1;
        }

        let shader_fades = fades.len() as u32 - stats.direct;
        let Some(scene) = scene else {
            stats.skipped = shader_fades;
            self.finish();
            return stats;
        };
        if shader_fades == 0 {
            self.finish();
            return stats;
        }

        self.backend.submit(DrawCommand::Clear {
            color: Some(Vec4::ZERO),
            depth: false,
        });
        self.backend.submit(DrawCommand::SetColor(Vec4::ONE));
        self.backend.submit(DrawCommand::BindTexture {
            unit: SCENE_COLOR_UNIT,
            texture: Some(scene.color),
        });
        self.backend
            .submit(DrawCommand::GenerateMipmaps(scene.color));
        self.backend.submit(DrawCommand::BindTexture {
            unit: SCENE_DEPTH_UNIT,
            texture: scene.depth,
        });

        for fade in fades.iter().filter(|fade| fade.pass_count() > 0) {
            match self.render_passes(fade, &scene, screen_blend) {
                Some(passes) => stats.shader_passes += passes,
                None => stats.skipped += 1,
            }
        }

        self.backend.submit(DrawCommand::BindTexture {
            unit: SCENE_DEPTH_UNIT,
            texture: None,
        });
        self.finish();
        stats
    }

    fn finish(&mut self) {
        self.backend.submit(DrawCommand::BindTexture {
            unit: SCENE_COLOR_UNIT,
            texture: None,
        });
        self.backend.submit(DrawCommand::SetBlend(None));
        self.backend.submit(DrawCommand::SetColor(Vec4::ONE));
    }

    fn restore_screen(&mut self) {
        self.backend.submit(DrawCommand::SetRenderTarget(None));
        self.backend.submit(DrawCommand::SetViewport {
            x: self.viewport.x,
            y: self.viewport.y,
            width: self.viewport.width,
            height: self.viewport.height,
        });
    }

    /// Returns the number of passes run, or `None` when the fade had to be
    /// abandoned. `screen_blend` is restored after the final blit.
    fn render_passes(
        &mut self,
        fade: &FadeEffect,
        scene: &SceneTexture,
        screen_blend: Option<BlendMode>,
    ) -> Option<u32> {
        let pass_count = fade.pass_count();
        let mut input = scene.target;
        let mut input_color = scene.color;

        for (pass, fade_pass) in fade.passes.iter().enumerate() {
            let downscale = fade.downscale(pass);
            let width = (self.viewport.width / downscale).max(1);
            let height = (self.viewport.height / downscale).max(1);
            let to_texture = downscale > 1 || pass + 1 < pass_count;

            let mut output = None;
            if to_texture {
                match self.cache.acquire(&mut *self.factory, width, height, false) {
                    Ok(id) => output = Some(id),
                    Err(err) => {
                        log::warn!(
                            "No {}x{} render target for fade pass {}: {}",
                            width,
                            height,
                            pass,
                            err
                        );
                        if pass > 0 {
                            self.cache.release(input);
                        }
                        return None;
                    }
                }
            }
            if let Some(id) = output {
                self.backend.submit(DrawCommand::SetRenderTarget(Some(id)));
                self.backend.submit(DrawCommand::SetViewport {
                    x: 0,
                    y: 0,
                    width,
                    height,
                });
                self.backend.submit(DrawCommand::Clear {
                    color: Some(Vec4::ZERO),
                    depth: false,
                });
                self.backend.submit(DrawCommand::SetDepthTest(None));
            }

            self.backend.submit(DrawCommand::BindTexture {
                unit: PASS_INPUT_UNIT,
                texture: Some(input_color),
            });
            self.backend.submit(DrawCommand::GenerateMipmaps(input_color));
            self.backend
                .submit(DrawCommand::BindShader(Some(fade_pass.shader)));
            self.backend.submit(DrawCommand::SetUniform {
                name: "pixelWidth",
                value: 1.0 / width as f32,
            });
            self.backend.submit(DrawCommand::SetUniform {
                name: "pixelHeight",
                value: 1.0 / height as f32,
            });
            self.backend.submit(DrawCommand::SetColor(fade.color));
            self.backend.submit(DrawCommand::DrawQuads(
                screen_quad(fade.geometry, Vec2::ONE, fade.color).to_vec(),
            ));
            self.backend.submit(DrawCommand::BindTexture {
                unit: PASS_INPUT_UNIT,
                texture: None,
            });
            self.backend.submit(DrawCommand::BindShader(None));

            match output {
                Some(id) => {
                    self.restore_screen();
                    if pass > 0 {
                        self.cache.release(input);
                    }
                    input = id;
                    input_color = match self.cache.get(id) {
                        Some(target) => target.color(),
                        None => {
                            log::error!("Render target {:?} vanished during fade", id);
                            return None;
                        }
                    };

                    if pass + 1 == pass_count {
                        self.backend.submit(DrawCommand::BindTexture {
                            unit: SCENE_DEPTH_UNIT,
                            texture: None,
                        });
                        self.backend.submit(DrawCommand::BindTexture {
                            unit: SCENE_COLOR_UNIT,
                            texture: Some(input_color),
                        });
                        self.backend.submit(DrawCommand::SetBlend(Some(fade.blend)));
                        self.backend.submit(DrawCommand::SetColor(fade.color));
                        self.backend.submit(DrawCommand::DrawQuads(
                            screen_quad(FULL_SCREEN, Vec2::ONE, fade.color).to_vec(),
                        ));
                        self.backend.submit(DrawCommand::SetBlend(screen_blend));
                        self.cache.release(id);
                    }
                }
                None if pass > 0 => {
                    self.cache.release(input);
                }
                None => {}
            }
        }
        Some(pass_count as u32)
    }
}
