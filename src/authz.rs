//! Role to route authorization.
//!
//! Every role is matched by exact membership. There is no hierarchy: an
//! admin asking for a teacher route is sent back to the admin home.

use crate::model::Role;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    AdminHome,
    AdminStudents,
    AdminAccounts,
    AdminHomework,
    AdminReportCards,
    AdminAnnouncements,
    AdminSlider,
    AdminCustomBlocks,
    AdminCustomPages,
    AdminAiMessages,
    AdminChat,
    AdminSettings,
    AdminProfile,
    AssistantHome,
    AssistantStudents,
    AssistantHomework,
    AssistantReportCards,
    AssistantChat,
    AssistantProfile,
    TeacherHome,
    TeacherHomework,
    TeacherGrades,
    TeacherChat,
    TeacherProfile,
    StudentHome,
    StudentHomework,
    StudentGrades,
    StudentAnnouncements,
    StudentChat,
    StudentAi,
    StudentPage,
    StudentProfile,
}

impl Route {
    pub const ALL: [Route; 33] = [
        Route::Login,
        Route::AdminHome,
        Route::AdminStudents,
        Route::AdminAccounts,
        Route::AdminHomework,
        Route::AdminReportCards,
        Route::AdminAnnouncements,
        Route::AdminSlider,
        Route::AdminCustomBlocks,
        Route::AdminCustomPages,
        Route::AdminAiMessages,
        Route::AdminChat,
        Route::AdminSettings,
        Route::AdminProfile,
        Route::AssistantHome,
        Route::AssistantStudents,
        Route::AssistantHomework,
        Route::AssistantReportCards,
        Route::AssistantChat,
        Route::AssistantProfile,
        Route::TeacherHome,
        Route::TeacherHomework,
        Route::TeacherGrades,
        Route::TeacherChat,
        Route::TeacherProfile,
        Route::StudentHome,
        Route::StudentHomework,
        Route::StudentGrades,
        Route::StudentAnnouncements,
        Route::StudentChat,
        Route::StudentAi,
        Route::StudentPage,
        Route::StudentProfile,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/auth",
            Route::AdminHome => "/admin",
            Route::AdminStudents => "/admin/students",
            Route::AdminAccounts => "/admin/accounts",
            Route::AdminHomework => "/admin/homework",
            Route::AdminReportCards => "/admin/report-cards",
            Route::AdminAnnouncements => "/admin/announcements",
            Route::AdminSlider => "/admin/slider",
            Route::AdminCustomBlocks => "/admin/custom-blocks",
            Route::AdminCustomPages => "/admin/custom-pages",
            Route::AdminAiMessages => "/admin/ai-messages",
            Route::AdminChat => "/admin/chat",
            Route::AdminSettings => "/admin/settings",
            Route::AdminProfile => "/admin/profile",
            Route::AssistantHome => "/assistant",
            Route::AssistantStudents => "/assistant/students",
            Route::AssistantHomework => "/assistant/homework",
            Route::AssistantReportCards => "/assistant/report-cards",
            Route::AssistantChat => "/assistant/chat",
            Route::AssistantProfile => "/assistant/profile",
            Route::TeacherHome => "/teacher",
            Route::TeacherHomework => "/teacher/homework",
            Route::TeacherGrades => "/teacher/grades",
            Route::TeacherChat => "/teacher/chat",
            Route::TeacherProfile => "/teacher/profile",
            Route::StudentHome => "/student",
            Route::StudentHomework => "/student/homework",
            Route::StudentGrades => "/student/grades",
            Route::StudentAnnouncements => "/student/announcements",
            Route::StudentChat => "/student/chat",
            Route::StudentAi => "/student/ai",
            Route::StudentPage => "/student/page",
            Route::StudentProfile => "/student/profile",
        }
    }

    /// Resolves a path; `/student/page/<id>` maps to [`Route::StudentPage`].
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        let path = if path.is_empty() { "/" } else { path };
        if let Some(rest) = path.strip_prefix("/student/page/") {
            return (!rest.is_empty() && !rest.contains('/')).then_some(Route::StudentPage);
        }
        Route::ALL.into_iter().find(|r| r.path() == path)
    }

    /// `None` for routes that need no session.
    pub fn allowed_roles(self) -> Option<&'static [Role]> {
        const ADMIN: &[Role] = &[Role::Admin];
        const ASSISTANT: &[Role] = &[Role::Assistant];
        const TEACHER: &[Role] = &[Role::Teacher];
        const STUDENT: &[Role] = &[Role::Student];
        match self {
            Route::Login => None,
            Route::AdminHome
            | Route::AdminStudents
            | Route::AdminAccounts
            | Route::AdminHomework
            | Route::AdminReportCards
            | Route::AdminAnnouncements
            | Route::AdminSlider
            | Route::AdminCustomBlocks
            | Route::AdminCustomPages
            | Route::AdminAiMessages
            | Route::AdminChat
            | Route::AdminSettings
            | Route::AdminProfile => Some(ADMIN),
            Route::AssistantHome
            | Route::AssistantStudents
            | Route::AssistantHomework
            | Route::AssistantReportCards
            | Route::AssistantChat
            | Route::AssistantProfile => Some(ASSISTANT),
            Route::TeacherHome
            | Route::TeacherHomework
            | Route::TeacherGrades
            | Route::TeacherChat
            | Route::TeacherProfile => Some(TEACHER),
            Route::StudentHome
            | Route::StudentHomework
            | Route::StudentGrades
            | Route::StudentAnnouncements
            | Route::StudentChat
            | Route::StudentAi
            | Route::StudentPage
            | Route::StudentProfile => Some(STUDENT),
        }
    }
}

impl Role {
    pub fn home(self) -> Route {
        match self {
            Role::Admin => Route::AdminHome,
            Role::Assistant => Route::AssistantHome,
            Role::Teacher => Route::TeacherHome,
            Role::Student => Route::StudentHome,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allow,
    Redirect(Route),
}

pub fn gate(session: &Session, allowed: &[Role]) -> Gate {
    match session.role() {
        None => Gate::Redirect(Route::Login),
        Some(role) if allowed.contains(&role) => Gate::Allow,
        Some(role) => Gate::Redirect(role.home()),
    }
}

pub fn gate_route(session: &Session, route: Route) -> Gate {
    match route.allowed_roles() {
        None => Gate::Allow,
        Some(allowed) => gate(session, allowed),
    }
}

/// Where `/` sends the caller.
pub fn landing(session: &Session) -> Route {
    session.role().map(Role::home).unwrap_or(Route::Login)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub label: &'static str,
    pub route: Route,
}

const fn nav(label: &'static str, route: Route) -> NavItem {
    NavItem { label, route }
}

const ADMIN_NAV: &[NavItem] = &[
    nav("Dashboard", Route::AdminHome),
    nav("Students", Route::AdminStudents),
    nav("Accounts", Route::AdminAccounts),
    nav("Homework", Route::AdminHomework),
    nav("Report cards", Route::AdminReportCards),
    nav("Announcements", Route::AdminAnnouncements),
    nav("Slider", Route::AdminSlider),
    nav("Custom blocks", Route::AdminCustomBlocks),
    nav("Custom pages", Route::AdminCustomPages),
    nav("AI conversations", Route::AdminAiMessages),
    nav("Chat", Route::AdminChat),
    nav("Settings", Route::AdminSettings),
];

const ASSISTANT_NAV: &[NavItem] = &[
    nav("Dashboard", Route::AssistantHome),
    nav("Students", Route::AssistantStudents),
    nav("Homework", Route::AssistantHomework),
    nav("Report cards", Route::AssistantReportCards),
    nav("Chat", Route::AssistantChat),
    nav("Profile", Route::AssistantProfile),
];

const TEACHER_NAV: &[NavItem] = &[
    nav("Dashboard", Route::TeacherHome),
    nav("Homework", Route::TeacherHomework),
    nav("Grades", Route::TeacherGrades),
    nav("Chat", Route::TeacherChat),
    nav("Profile", Route::TeacherProfile),
];

const STUDENT_NAV: &[NavItem] = &[
    nav("Home", Route::StudentHome),
    nav("Homework", Route::StudentHomework),
    nav("Grades and report cards", Route::StudentGrades),
    nav("Announcements", Route::StudentAnnouncements),
    nav("Chat", Route::StudentChat),
    nav("AI assistant", Route::StudentAi),
    nav("Profile", Route::StudentProfile),
];

pub fn nav_items(role: Role) -> &'static [NavItem] {
    match role {
        Role::Admin => ADMIN_NAV,
        Role::Assistant => ASSISTANT_NAV,
        Role::Teacher => TEACHER_NAV,
        Role::Student => STUDENT_NAV,
    }
}
