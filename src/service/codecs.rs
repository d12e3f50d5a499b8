//! Codec change handling
//!
//! Observers always get a fresh snapshot when the current configuration is
//! reported, even when nothing changed, because the report itself means a
//! (re)configuration completed. Routing only moves when the group is active
//! and the change is audible.

use super::LeAudioService;
use crate::codec::CodecConfig;
use crate::hooks::SystemHooks;
use crate::{GroupId, Notification};

impl<H: SystemHooks> LeAudioService<H> {
    pub(crate) fn on_group_codec_config(
        &mut self,
        group: GroupId,
        input: Option<CodecConfig>,
        output: Option<CodecConfig>,
    ) {
        self.codecs.set_current(group, input, output);
        self.effects
            .notifications
            .push(Notification::CodecConfig {
                group,
                status: self.codecs.status(group),
            })
            .ok();

        if self.active_group != Some(group) {
            return;
        }
        let volume = self.hooks.group_volume(group);
        for (config, is_output) in [(output, true), (input, false)] {
            if let Some(update) = self.routing.reconfigure(is_output, config.as_ref(), volume) {
                self.effects.routing.push(update).ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::codec::CodecConfig;
    use crate::constants::CONTEXT_MEDIA;
    use crate::service::test_util::{
        activate_group, connect_device, dev, join_group, set_audio_conf, svc,
    };
    use crate::stack::StackEvent;
    use crate::{GroupId, Notification};

    fn group() -> GroupId {
        GroupId(5)
    }

    fn codec_event(group: GroupId, output: CodecConfig) -> StackEvent {
        StackEvent::GroupCodecConfig {
            group,
            input: None,
            output: Some(output),
        }
    }

    fn codec_notifications(service: &mut crate::LeAudioService<crate::hooks::mock::TestHooks>) -> usize {
        service
            .take_notifications()
            .iter()
            .filter(|n| matches!(n, Notification::CodecConfig { .. }))
            .count()
    }

    #[test]
    fn test_current_config_always_notifies() {
        let mut service = svc();
        let config = CodecConfig::lc3(48_000, 2, 120);

        service.message_from_native(codec_event(group(), config));
        assert_eq!(codec_notifications(&mut service), 1);

        // Identical report still completes a reconfiguration
        service.message_from_native(codec_event(group(), config));
        assert_eq!(codec_notifications(&mut service), 1);
    }

    #[test]
    fn test_notification_carries_selectable_set_earlier() {
        let mut service = svc();
        let selectable =
            heapless::Vec::from_slice(&[CodecConfig::lc3(48_000, 2, 120)]).unwrap();
        service.message_from_native(StackEvent::GroupSelectableCodecConfig {
            group: group(),
            input: heapless::Vec::new(),
            output: selectable.clone(),
        });
        // Selectable alone is not a completed reconfiguration
        assert_eq!(codec_notifications(&mut service), 0);

        service.message_from_native(codec_event(group(), CodecConfig::lc3(48_000, 2, 120)));
        let notifications = service.take_notifications();
        let Some(Notification::CodecConfig { status, .. }) = notifications
            .iter()
            .find(|n| matches!(n, Notification::CodecConfig { .. }))
        else {
            panic!("missing codec notification");
        };
        assert_eq!(status.output_selectable, selectable);
        assert_eq!(status.output, Some(CodecConfig::lc3(48_000, 2, 120)));
    }

    #[test]
    fn test_audible_change_on_active_group_reroutes_once() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        join_group(&mut service, dev(1), group());
        set_audio_conf(&mut service, group(), 1, CONTEXT_MEDIA);
        service.message_from_native(codec_event(group(), CodecConfig::lc3(48_000, 2, 120)));
        activate_group(&mut service, dev(1), group());

        service.message_from_native(codec_event(group(), CodecConfig::lc3(16_000, 1, 40)));
        let updates = service.take_routing_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].new_device, Some(dev(1)));
        assert_eq!(updates[0].old_device, Some(dev(1)));
        assert!(updates[0].profile.output);
    }

    #[test]
    fn test_inaudible_change_does_not_reroute() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        join_group(&mut service, dev(1), group());
        set_audio_conf(&mut service, group(), 1, CONTEXT_MEDIA);
        service.message_from_native(codec_event(group(), CodecConfig::lc3(48_000, 2, 120)));
        activate_group(&mut service, dev(1), group());

        // Same sample rate and channel count, different bitrate
        service.message_from_native(codec_event(group(), CodecConfig::lc3(48_000, 2, 100)));
        assert!(service.take_routing_updates().is_empty());
        // The snapshot notification still goes out
        assert_eq!(codec_notifications(&mut service), 1);
    }

    #[test]
    fn test_change_on_inactive_group_does_not_reroute() {
        let mut service = svc();
        connect_device(&mut service, dev(1));
        join_group(&mut service, dev(1), group());
        set_audio_conf(&mut service, group(), 1, CONTEXT_MEDIA);

        service.message_from_native(codec_event(group(), CodecConfig::lc3(48_000, 2, 120)));
        service.message_from_native(codec_event(group(), CodecConfig::lc3(16_000, 1, 40)));
        assert!(service.take_routing_updates().is_empty());
    }
}
