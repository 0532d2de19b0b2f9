mod actions;
mod body;
mod navigation;
mod search;
mod sync;
mod watch;

use std::collections::VecDeque;

use bucketwatch_core::bridge::RoutedNotification;
use bucketwatch_core::cache::{MessageListCache, RefreshTicket};
use bucketwatch_core::client::RestClient;
use bucketwatch_core::config::{Config, LayoutConfig};
use bucketwatch_core::debounce::{Debouncer, Ticket};
use bucketwatch_core::models::{MessageDetail, MessageSummary};
use cosmic::app::{Core, Task};
use cosmic::iced::keyboard;
use cosmic::iced::{Event, Length, Subscription};
use cosmic::widget;
use cosmic::widget::pane_grid;
use cosmic::Element;

pub use watch::MonitorUpdate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneKind {
    Sidebar,
    MessageList,
    MessageView,
}

const APP_ID: &str = "com.bucketwatch.console";

/// Recent notifications kept in the sidebar.
const MAX_NOTIFICATIONS: usize = 50;

/// What the sidebar shows for the push monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Off,
    Connecting,
    Connected,
    /// Wanted on but the connection dropped; offers a retry.
    Disconnected,
}

pub struct AppModel {
    core: Core,
    pub(super) config: Config,
    pub(super) client: Option<RestClient>,

    pub(super) cache: MessageListCache,
    pub(super) mailbox_input: String,

    /// Id of the open message. Survives reloads as long as the id does.
    pub(super) selected: Option<String>,
    pub(super) detail: Option<MessageDetail>,

    pub(super) monitor_wanted: bool,
    pub(super) monitor_state: MonitorState,
    pub(super) monitor_commands: Option<tokio::sync::mpsc::UnboundedSender<bool>>,
    pub(super) notifications: VecDeque<RoutedNotification>,

    pub(super) status_message: String,

    // Search state
    pub(super) search_query: String,
    pub(super) search_focused: bool,
    pub(super) search_trigger: Debouncer<String>,

    // Pane layout
    pub(super) panes: pane_grid::State<PaneKind>,
    pub(super) layout_trigger: Debouncer<()>,
}

#[derive(Debug, Clone)]
pub enum Message {
    // Mailbox list
    MailboxInputChanged(String),
    OpenMailbox,
    Refresh,
    ToggleSortOrder,
    ListLoaded {
        ticket: RefreshTicket,
        result: bucketwatch_core::Result<Vec<MessageSummary>>,
    },

    // Selection / detail
    SelectMessage(String),
    DetailLoaded {
        id: String,
        result: Result<MessageDetail, String>,
    },
    MarkSeenComplete {
        id: String,
        result: Result<(), String>,
    },
    ViewSource,
    ViewHtml,
    OpenAttachment(usize),

    // Delete / purge
    DeleteSelected,
    DeleteComplete {
        id: String,
        result: bucketwatch_core::Result<()>,
    },
    Purge,
    PurgeComplete(Result<(), String>),

    // Keyboard navigation
    SelectionUp,
    SelectionDown,

    // Search
    SearchActivate,
    SearchQueryChanged(String),
    SearchTick(Ticket),
    SearchCommit,
    SearchClear,

    // Push monitor
    Monitor(MonitorUpdate),
    ToggleMonitor(bool),
    RetryMonitor,
    NotificationClicked(String),
    ClearNotifications,

    PaneResized(pane_grid::ResizeEvent),
    LayoutTick(Ticket),
    Noop,
}

impl cosmic::Application for AppModel {
    type Executor = cosmic::executor::Default;
    type Flags = ();
    type Message = Message;

    const APP_ID: &'static str = APP_ID;

    fn core(&self) -> &Core {
        &self.core
    }

    fn core_mut(&mut self) -> &mut Core {
        &mut self.core
    }

    fn init(core: Core, _flags: Self::Flags) -> (Self, Task<Self::Message>) {
        let config = Config::resolve();

        let client = config
            .server()
            .and_then(|base| RestClient::new(base, config.request_timeout()));
        let (client, status_message) = match client {
            Ok(client) => {
                log::info!("Using mail server {}", client.base());
                let status = format!("Server: {}", client.base());
                (Some(client), status)
            }
            Err(e) => {
                log::error!("Invalid server URL {:?}: {}", config.server_url, e);
                (None, format!("Invalid server URL: {e}"))
            }
        };

        let layout = LayoutConfig::load();
        let pane_config = pane_grid::Configuration::Split {
            axis: pane_grid::Axis::Vertical,
            ratio: layout.sidebar_ratio,
            a: Box::new(pane_grid::Configuration::Pane(PaneKind::Sidebar)),
            b: Box::new(pane_grid::Configuration::Split {
                axis: pane_grid::Axis::Vertical,
                ratio: layout.list_ratio,
                a: Box::new(pane_grid::Configuration::Pane(PaneKind::MessageList)),
                b: Box::new(pane_grid::Configuration::Pane(PaneKind::MessageView)),
            }),
        };
        let panes = pane_grid::State::with_configuration(pane_config);

        let mut app = AppModel {
            core,
            cache: MessageListCache::new(config.newest_first),
            mailbox_input: String::new(),
            selected: None,
            detail: None,
            monitor_wanted: config.monitor_on_start,
            monitor_state: MonitorState::Off,
            monitor_commands: None,
            notifications: VecDeque::new(),
            status_message,
            search_query: String::new(),
            search_focused: false,
            search_trigger: Debouncer::new(config.search_delay()),
            panes,
            layout_trigger: Debouncer::new(config.resize_delay()),
            client,
            config,
        };

        let title_task = app.set_window_title("Bucketwatch".into());
        let mut tasks = vec![title_task];

        if let Some(name) = app.config.default_mailbox().map(str::to_string) {
            app.mailbox_input = name.clone();
            tasks.push(app.open_mailbox(name, None));
        }

        (app, cosmic::task::batch(tasks))
    }

    fn subscription(&self) -> Subscription<Self::Message> {
        let mut subs = Vec::new();

        if self.search_focused {
            // While typing in search only Escape is ours.
            subs.push(cosmic::iced_futures::event::listen_raw(|event, status, _| {
                if cosmic::iced_core::event::Status::Ignored != status {
                    return None;
                }
                match event {
                    Event::Keyboard(keyboard::Event::KeyPressed {
                        key: keyboard::Key::Named(keyboard::key::Named::Escape),
                        ..
                    }) => Some(Message::SearchClear),
                    _ => None,
                }
            }));
        } else {
            subs.push(cosmic::iced_futures::event::listen_raw(|event, status, _| {
                if cosmic::iced_core::event::Status::Ignored != status {
                    return None;
                }
                match event {
                    Event::Keyboard(keyboard::Event::KeyPressed {
                        key, modifiers, ..
                    }) => match key {
                        keyboard::Key::Named(keyboard::key::Named::ArrowDown) => {
                            Some(Message::SelectionDown)
                        }
                        keyboard::Key::Named(keyboard::key::Named::ArrowUp) => {
                            Some(Message::SelectionUp)
                        }
                        keyboard::Key::Named(keyboard::key::Named::Delete) => {
                            Some(Message::DeleteSelected)
                        }
                        keyboard::Key::Character(ref c)
                            if c.as_str() == "/" && !modifiers.control() =>
                        {
                            Some(Message::SearchActivate)
                        }
                        keyboard::Key::Character(ref c)
                            if c.as_str() == "j" && !modifiers.control() =>
                        {
                            Some(Message::SelectionDown)
                        }
                        keyboard::Key::Character(ref c)
                            if c.as_str() == "k" && !modifiers.control() =>
                        {
                            Some(Message::SelectionUp)
                        }
                        keyboard::Key::Character(ref c)
                            if c.as_str() == "r" && !modifiers.control() =>
                        {
                            Some(Message::Refresh)
                        }
                        keyboard::Key::Named(keyboard::key::Named::Escape) => {
                            Some(Message::SearchClear)
                        }
                        _ => None,
                    },
                    _ => None,
                }
            }));
        }

        if let Some(client) = &self.client {
            subs.push(
                Subscription::run_with_id(
                    "monitor-bridge",
                    watch::monitor_stream(client.base().clone(), self.config.monitor_path.clone()),
                )
                .map(Message::Monitor),
            );
        }

        Subscription::batch(subs)
    }

    fn view(&self) -> Element<'_, Self::Message> {
        let main_content = widget::PaneGrid::new(&self.panes, |_pane, kind, _is_maximized| {
            let body: Element<'_, Self::Message> = match kind {
                PaneKind::Sidebar => crate::ui::sidebar::view(
                    &self.mailbox_input,
                    self.cache.mailbox(),
                    self.monitor_state,
                    &self.notifications,
                ),
                PaneKind::MessageList => crate::ui::message_list::view(
                    &self.cache,
                    self.selected.as_deref(),
                    &self.search_query,
                ),
                PaneKind::MessageView => crate::ui::message_view::view(self.detail.as_ref()),
            };
            pane_grid::Content::new(body)
        })
        .on_resize(10.0, Message::PaneResized)
        .width(Length::Fill)
        .height(Length::Fill);

        let status_bar = widget::container(widget::text::caption(&self.status_message))
            .padding([4, 8])
            .width(Length::Fill);

        widget::column()
            .push(main_content)
            .push(status_bar)
            .height(Length::Fill)
            .into()
    }

    fn update(&mut self, message: Self::Message) -> Task<Self::Message> {
        match message {
            // Mailbox list
            Message::MailboxInputChanged(_)
            | Message::OpenMailbox
            | Message::Refresh
            | Message::ToggleSortOrder
            | Message::ListLoaded { .. } => self.handle_sync(message),

            // Detail
            Message::SelectMessage(_)
            | Message::DetailLoaded { .. }
            | Message::MarkSeenComplete { .. }
            | Message::ViewSource
            | Message::ViewHtml
            | Message::OpenAttachment(_) => self.handle_body(message),

            // Delete / purge
            Message::DeleteSelected
            | Message::DeleteComplete { .. }
            | Message::Purge
            | Message::PurgeComplete(_) => self.handle_actions(message),

            // Keyboard navigation
            Message::SelectionUp | Message::SelectionDown => self.handle_navigation(message),

            // Search
            Message::SearchActivate
            | Message::SearchQueryChanged(_)
            | Message::SearchTick(_)
            | Message::SearchCommit
            | Message::SearchClear => self.handle_search(message),

            // Push monitor
            Message::Monitor(_)
            | Message::ToggleMonitor(_)
            | Message::RetryMonitor
            | Message::NotificationClicked(_)
            | Message::ClearNotifications => self.handle_watch(message),

            // Pane layout
            Message::PaneResized(pane_grid::ResizeEvent { split, ratio }) => {
                self.panes.resize(split, ratio);
                let ticket = self.layout_trigger.schedule(());
                cosmic::task::future(async move {
                    tokio::time::sleep_until(ticket.deadline()).await;
                    Message::LayoutTick(ticket)
                })
            }
            Message::LayoutTick(ticket) => {
                if self.layout_trigger.fire(ticket).is_some() {
                    self.save_layout();
                }
                Task::none()
            }
            Message::Noop => Task::none(),
        }
    }
}

impl AppModel {
    fn set_window_title(&self, title: String) -> cosmic::app::Task<Message> {
        self.core.set_title(self.core.main_window_id(), title)
    }

    /// Dispatch a message through the update loop (for recursive calls from handlers).
    pub(super) fn dispatch(&mut self, message: Message) -> Task<Message> {
        <Self as cosmic::Application>::update(self, message)
    }

    pub(super) fn clear_selection(&mut self) {
        self.selected = None;
        self.detail = None;
    }

    pub(super) fn push_notification(&mut self, routed: RoutedNotification) {
        self.notifications.push_front(routed);
        self.notifications.truncate(MAX_NOTIFICATIONS);
    }

    /// Extract current split ratios from pane_grid layout tree and persist.
    fn save_layout(&self) {
        fn extract_ratios(node: &pane_grid::Node) -> (f32, f32) {
            let defaults = LayoutConfig::default();
            match node {
                pane_grid::Node::Split { ratio, b, .. } => {
                    // Inner split is in the 'b' branch
                    let list_ratio = match b.as_ref() {
                        pane_grid::Node::Split { ratio, .. } => *ratio,
                        _ => defaults.list_ratio,
                    };
                    (*ratio, list_ratio)
                }
                _ => (defaults.sidebar_ratio, defaults.list_ratio),
            }
        }

        let (sidebar_ratio, list_ratio) = extract_ratios(self.panes.layout());
        let layout = LayoutConfig {
            sidebar_ratio,
            list_ratio,
        };
        layout.save();
    }
}
